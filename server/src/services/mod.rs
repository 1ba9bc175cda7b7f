pub mod auth;
pub mod categories;
pub mod events;
pub mod tickets;

pub use auth::AuthService;
pub use categories::CategoryService;
pub use events::EventService;
pub use tickets::TicketService;
