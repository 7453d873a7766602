//! HTTP middleware

mod auth;

pub use auth::{actor_middleware, ActorContext, CurrentActor};
