//! Route registration with an explicit access level per route.
//!
//! Nothing is inferred from the HTTP method: a `GET` is only public when it
//! is registered as [`Access::Public`].
use axum::{middleware, routing::MethodRouter, Router};

use crate::{auth::extractors::require_auth, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    RequiresAuth,
}

pub struct RouteTable {
    router: Router<AppState>,
    state: AppState,
}

impl RouteTable {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Router::new(),
            state,
        }
    }

    /// Registers `handler` under `path`. The same path may be registered
    /// several times with different methods and different access levels.
    pub fn route(mut self, path: &str, access: Access, handler: MethodRouter<AppState>) -> Self {
        let handler = match access {
            Access::Public => handler,
            Access::RequiresAuth => handler.route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_auth,
            )),
        };
        self.router = self.router.route(path, handler);
        self
    }

    pub fn merge(mut self, other: RouteTable) -> Self {
        self.router = self.router.merge(other.router);
        self
    }

    pub fn into_router(self) -> Router<AppState> {
        self.router
    }
}
