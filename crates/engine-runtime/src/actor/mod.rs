#[allow(clippy::module_inception)]
mod actor;
pub mod messages;
pub mod recorder;
mod spawn;

pub use actor::{Actor, ActorContext, ActorRef};
pub use spawn::spawn_actor;
