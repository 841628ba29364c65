pub mod account_helpers;
pub mod blog_helpers;
pub mod form_helpers;
pub mod pagination_helpers;
pub mod render_helpers;
