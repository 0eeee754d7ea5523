//! Robot-side step logic: command dispatch, subscriptions, snapshot building

pub mod constants;
pub mod dispatch;
pub mod measurement;
pub mod performance;
pub mod subscription;
