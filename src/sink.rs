//! Output sink.
//!
//! The loader never talks to a concrete host. It describes the module
//! through this trait: target configuration, segments, names, function
//! boundaries and annotations. Any error returned by a sink aborts the
//! load.

use anyhow::Result;

use crate::arch::TargetConfig;
use crate::layout::Segment;

/// Where an annotation is attached.
///
/// Both positions are part of the sink contract. The loader itself only
/// emits `Repeatable` (relocation targets); `Regular` is there for other
/// producers driving the same sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationPosition {
    /// Shown only at the annotated address.
    Regular,
    /// Also shown wherever the address is referenced.
    Repeatable,
}

pub trait Sink {
    /// Called once per load, before anything else.
    fn configure_target(&mut self, target: &TargetConfig) -> Result<()>;

    /// Creates one address-space region.
    fn create_region(&mut self, segment: &Segment) -> Result<()>;

    /// Names an address.
    fn set_name(&mut self, address: u32, name: &str) -> Result<()>;

    /// Marks an address as a function entry point.
    fn mark_function(&mut self, address: u32) -> Result<()>;

    /// Attaches free text to an address.
    fn add_annotation(
        &mut self,
        address: u32,
        text: &str,
        position: AnnotationPosition,
    ) -> Result<()>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn configure_target(&mut self, target: &TargetConfig) -> Result<()> {
        (**self).configure_target(target)
    }

    fn create_region(&mut self, segment: &Segment) -> Result<()> {
        (**self).create_region(segment)
    }

    fn set_name(&mut self, address: u32, name: &str) -> Result<()> {
        (**self).set_name(address, name)
    }

    fn mark_function(&mut self, address: u32) -> Result<()> {
        (**self).mark_function(address)
    }

    fn add_annotation(
        &mut self,
        address: u32,
        text: &str,
        position: AnnotationPosition,
    ) -> Result<()> {
        (**self).add_annotation(address, text, position)
    }
}

/// Forwards every call to two sinks, first `A` then `B`.
pub struct Tee<A, B>(pub A, pub B);

impl<A: Sink, B: Sink> Sink for Tee<A, B> {
    fn configure_target(&mut self, target: &TargetConfig) -> Result<()> {
        self.0.configure_target(target)?;
        self.1.configure_target(target)
    }

    fn create_region(&mut self, segment: &Segment) -> Result<()> {
        self.0.create_region(segment)?;
        self.1.create_region(segment)
    }

    fn set_name(&mut self, address: u32, name: &str) -> Result<()> {
        self.0.set_name(address, name)?;
        self.1.set_name(address, name)
    }

    fn mark_function(&mut self, address: u32) -> Result<()> {
        self.0.mark_function(address)?;
        self.1.mark_function(address)
    }

    fn add_annotation(
        &mut self,
        address: u32,
        text: &str,
        position: AnnotationPosition,
    ) -> Result<()> {
        self.0.add_annotation(address, text, position)?;
        self.1.add_annotation(address, text, position)
    }
}
