// Page-object layer
//
// Thin wrappers that name the selectors of one page and compose
// ActionExecutor calls. Each page derefs to BasePage for the shared helpers.

pub mod base_page;
pub mod contact_page;
pub mod dashboard_page;
pub mod login_page;

pub use base_page::BasePage;
pub use contact_page::ContactPage;
pub use dashboard_page::DashboardPage;
pub use login_page::LoginPage;
