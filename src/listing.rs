//! Recording sink.
//!
//! Keeps every sink call in order. The CLI prints it; tests inspect it.

use anyhow::Result;
use std::fmt;

use crate::arch::TargetConfig;
use crate::layout::Segment;
use crate::sink::{AnnotationPosition, Sink};

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Target(TargetConfig),
    Region(Segment),
    Name { address: u32, name: String },
    Function { address: u32 },
    Annotation {
        address: u32,
        text: String,
        position: AnnotationPosition,
    },
}

#[derive(Debug, Default)]
pub struct Listing {
    pub events: Vec<Event>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regions(&self) -> impl Iterator<Item = &Segment> {
        self.events.iter().filter_map(|e| match e {
            Event::Region(s) => Some(s),
            _ => None,
        })
    }

    /// Name set at `address`, if any.
    pub fn name_at(&self, address: u32) -> Option<&str> {
        self.events.iter().rev().find_map(|e| match e {
            Event::Name { address: a, name } if *a == address => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn is_function(&self, address: u32) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, Event::Function { address: a } if *a == address))
    }

    pub fn annotations(&self) -> impl Iterator<Item = (u32, &str)> {
        self.events.iter().filter_map(|e| match e {
            Event::Annotation { address, text, .. } => Some((*address, text.as_str())),
            _ => None,
        })
    }
}

impl Sink for Listing {
    fn configure_target(&mut self, target: &TargetConfig) -> Result<()> {
        self.events.push(Event::Target(target.clone()));
        Ok(())
    }

    fn create_region(&mut self, segment: &Segment) -> Result<()> {
        self.events.push(Event::Region(segment.clone()));
        Ok(())
    }

    fn set_name(&mut self, address: u32, name: &str) -> Result<()> {
        self.events.push(Event::Name {
            address,
            name: name.to_string(),
        });
        Ok(())
    }

    fn mark_function(&mut self, address: u32) -> Result<()> {
        self.events.push(Event::Function { address });
        Ok(())
    }

    fn add_annotation(
        &mut self,
        address: u32,
        text: &str,
        position: AnnotationPosition,
    ) -> Result<()> {
        self.events.push(Event::Annotation {
            address,
            text: text.to_string(),
            position,
        });
        Ok(())
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in &self.events {
            match event {
                Event::Target(t) => writeln!(
                    f,
                    "target    {} {:?} {:?} cm=0x{:02x}",
                    t.processor,
                    t.endianness,
                    t.abi.compiler,
                    t.abi.model_flags()
                )?,
                Event::Region(s) => writeln!(
                    f,
                    "segment   {:08x}-{:08x} {:<9} {}",
                    s.start,
                    s.end,
                    s.name,
                    if s.is_code() { "CODE" } else { "DATA" }
                )?,
                Event::Name { address, name } => writeln!(f, "name      {:08x} {}", address, name)?,
                Event::Function { address } => writeln!(f, "function  {:08x}", address)?,
                Event::Annotation {
                    address,
                    text,
                    position,
                } => {
                    let marker = match position {
                        AnnotationPosition::Regular => ";",
                        AnnotationPosition::Repeatable => ";;",
                    };
                    writeln!(f, "comment   {:08x} {} {}", address, marker, text)?
                }
            }
        }
        Ok(())
    }
}
