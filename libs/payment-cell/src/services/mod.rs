pub mod gateway;
pub mod razorpay;
pub mod reconciler;
pub mod stripe;

pub use gateway::{CheckoutGateway, OrderGateway};
pub use razorpay::RazorpayClient;
pub use reconciler::PaymentReconciler;
pub use stripe::StripeClient;
