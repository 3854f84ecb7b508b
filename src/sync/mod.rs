pub mod identity;
pub mod reconcile;
pub mod session;
pub mod state;

pub use identity::{IdentityResolver, RetryPolicy};
pub use reconcile::{Outcome, Reconciled, reconcile};
pub use session::ChatSession;
pub use state::{ConversationSnapshot, ConversationState, EventOutcome, FetchTicket, PendingSend};
