pub mod event;
pub mod protocol;
pub mod source;
pub mod turn;
mod turn_id;

pub use event::DomainEvent;
pub use source::Source;
pub use turn::Activity;
pub use turn::ReflectionProgress;
pub use turn::Turn;
pub use turn::TurnStatus;
pub use turn_id::TurnId;
