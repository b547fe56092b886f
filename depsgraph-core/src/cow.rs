//! Copy-on-write Shadows
//!
//! Every ID node exposes two data-block references: the original, owned by
//! the outside world, and the one evaluation binds to. Which of the two
//! shapes an ID node gets is decided by a [`ShadowStrategy`] picked once per
//! graph from its [`DepsgraphConfig`](crate::config::DepsgraphConfig):
//!
//! - [`AliasShadow`]: the evaluation reference is the original handle.
//! - [`CopyShadow`]: the evaluation reference is a private copy, made as
//!   soon as the ID node is initialized so operations can bind to it from
//!   the start.

use std::sync::Arc;

use tracing::debug;

use crate::id::{IdRef, id_address};

/// The evaluation-side reference held by an ID node.
#[derive(Debug, Clone)]
pub enum Shadow {
    /// Evaluation works directly on the original data-block.
    Aliased(IdRef),
    /// Evaluation works on a copy owned by the ID node.
    Owned(IdRef),
}

impl Shadow {
    /// The data-block evaluation binds to.
    pub fn id(&self) -> &IdRef {
        match self {
            Shadow::Aliased(id) | Shadow::Owned(id) => id,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Shadow::Owned(_))
    }
}

/// Decides how an ID node's evaluation reference is produced and released.
pub trait ShadowStrategy: Send + Sync {
    /// Short name, used in logs and snapshots.
    fn name(&self) -> &'static str;

    /// Produce the evaluation reference for `orig`.
    fn create(&self, orig: &IdRef) -> Shadow;

    /// Give back a reference produced by [`create`](Self::create).
    fn release(&self, orig: &IdRef, shadow: Shadow);
}

/// Strategy used when copy-on-write is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct AliasShadow;

impl ShadowStrategy for AliasShadow {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn create(&self, orig: &IdRef) -> Shadow {
        Shadow::Aliased(Arc::clone(orig))
    }

    fn release(&self, _orig: &IdRef, _shadow: Shadow) {}
}

/// Strategy used when copy-on-write is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyShadow {
    verbose: bool,
}

impl CopyShadow {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ShadowStrategy for CopyShadow {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn create(&self, orig: &IdRef) -> Shadow {
        let copy = orig.read().copy_for_eval().into_ref();
        if self.verbose {
            debug!(
                id = %orig.read(),
                id_orig = id_address(orig),
                id_cow = id_address(&copy),
                "create copy-on-write shadow"
            );
        }
        Shadow::Owned(copy)
    }

    fn release(&self, orig: &IdRef, shadow: Shadow) {
        if let Shadow::Owned(copy) = shadow {
            if self.verbose {
                debug!(
                    id = %orig.read(),
                    id_orig = id_address(orig),
                    id_cow = id_address(&copy),
                    "release copy-on-write shadow"
                );
            }
            drop(copy);
        }
    }
}
