//! Hooks that see every frame a station sends

use tracing::debug;

use sireader_core::{CardEvent, CardModel, Frame};

use crate::error::Result;

/// What the station should do with an inspected frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the frame to the caller
    Pass,
    /// The frame changed the card in the station; the current exchange
    /// is void
    CardChanged,
}

/// Inspects each frame before it reaches the caller
pub trait FrameInterceptor: Send {
    fn inspect(&mut self, frame: &Frame) -> Result<Disposition>;
}

/// Intercepts nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl FrameInterceptor for PassThrough {
    fn inspect(&mut self, _frame: &Frame) -> Result<Disposition> {
        Ok(Disposition::Pass)
    }
}

/// Card currently sitting in a readout station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedCard {
    pub model: CardModel,
    pub number: u32,
}

/// Tracks card insert and removal frames of a readout station
#[derive(Debug, Default, Clone)]
pub struct CardDetector {
    card: Option<InsertedCard>,
}

impl CardDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn card(&self) -> Option<InsertedCard> {
        self.card
    }
}

impl FrameInterceptor for CardDetector {
    fn inspect(&mut self, frame: &Frame) -> Result<Disposition> {
        match CardEvent::from_frame(frame)? {
            Some(CardEvent::Inserted { model, number }) => {
                debug!("{} card {} inserted", model, number);
                self.card = Some(InsertedCard { model, number });
                Ok(Disposition::CardChanged)
            }
            Some(CardEvent::Removed) => {
                debug!("Card removed");
                self.card = None;
                Ok(Disposition::CardChanged)
            }
            None => Ok(Disposition::Pass),
        }
    }
}
