//! Request dispatch: shared context, failure classification, and the
//! dispatcher itself.

mod context;
mod dispatch;
mod error;

pub use context::RpcContext;
pub use dispatch::{Dispatch, RpcDispatcher};
pub use error::{classify, error_response, DispatchFailure};
