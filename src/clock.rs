use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::model::TimeSlot;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> FixedClock {
        FixedClock {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Time zone used to place a collection instant into a day/hour slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotZone {
    #[default]
    Local,
    Named(Tz),
}

impl SlotZone {
    pub fn slot(&self, instant: DateTime<Utc>) -> TimeSlot {
        match self {
            SlotZone::Local => slot_in(instant, &Local),
            SlotZone::Named(tz) => slot_in(instant, tz),
        }
    }
}

fn slot_in<Z: TimeZone>(instant: DateTime<Utc>, zone: &Z) -> TimeSlot {
    let local = instant.with_timezone(zone);
    TimeSlot {
        day_of_week: local.weekday().num_days_from_monday() as u8,
        hour: local.hour() as u8,
    }
}
