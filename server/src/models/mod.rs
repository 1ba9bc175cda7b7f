pub mod category;
pub mod event;
pub mod identity;
pub mod ticket;
pub mod user;

pub use category::{slugify, Category, CreateCategory, NewCategory};
pub use event::{
    max_price, max_ticket_total, CreateEvent, Event, EventFilter, EventQuery, NewEvent, Page,
    UpdateEvent, MONEY_SCALE,
};
pub use identity::{Identity, Role};
pub use ticket::{PurchaseOutcome, PurchaseRequest, Ticket, TicketList, TicketWithEvent};
pub use user::{AuthSession, LoginRequest, NewUser, RegisterRequest, User, UserCredentials};
