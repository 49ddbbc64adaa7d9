//! This module provides extensions to Kubernetes API types.

mod pod;

pub use self::pod::PodExt;
