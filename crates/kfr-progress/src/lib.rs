//! # KFR Progress
//!
//! A blocking, cancelable wait shown from the thread that started some work.
//!
//! [`ModalWait`] lives on its owner thread and pumps a queue of closures
//! posted through [`OwnerHandle`] until a [`ModalEnder`] ends it. The
//! visible part is a [`ProgressSurface`]; it gets a single [`CancelAction`].

pub mod owner;
pub mod surface;

pub use owner::{CancelAction, ModalEnder, ModalResult, ModalWait, OwnerHandle};
pub use surface::{HeadlessSurface, ProgressSurface, TerminalSurface};
