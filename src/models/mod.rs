pub mod gateway_event;
pub mod payment_event;
pub mod retry_queue;
pub mod ticket;
pub mod transaction;

pub use gateway_event::{GatewayEvent, ProcessingStatus, VerificationStatus};
pub use payment_event::PaymentEvent;
pub use retry_queue::{QueueStatus, RetryQueueEntry};
pub use ticket::{RegistrationStatus, Ticket, TicketType, TicketValidity};
pub use transaction::{Gateway, Transaction, TransactionStatus};
