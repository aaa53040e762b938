use crate::{routes::RouteTable, state::AppState};

mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
mod validation;

pub fn routes(state: AppState) -> RouteTable {
    handlers::auth_routes(state)
}
