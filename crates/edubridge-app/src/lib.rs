//! View state for the Edubridge client. Each view owns its state and talks
//! to the backend through `AppContext`; feedback goes out as toasts.

pub mod auth;
pub mod comments;
pub mod context;
pub mod demo;
pub mod error;
pub mod feed;
pub mod messages;
pub mod notifications;
pub mod shell;
pub mod toast;
pub mod upload;
pub mod verification;
pub mod wishlist;

pub use context::{AppContext, Viewer};
pub use error::{AppError, AppResult};
pub use shell::{Page, Shell};
pub use toast::{Toast, ToastLevel, Toaster};
