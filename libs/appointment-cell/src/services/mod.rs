pub mod booking;
pub mod ledger;
pub mod store;
pub mod supabase_store;

pub use booking::AppointmentBookingService;
pub use store::{AppointmentStore, InMemoryAppointmentStore, StoreSeed};
pub use supabase_store::SupabaseAppointmentStore;
