//! The live PV snapshot
//!
//! `NtValue` is one committed (or prospective) state of a PV: the payload
//! plus the standard optional sub-structures, with a mask recording which
//! top-level fields the most recent operation touched. The mask is what
//! rules use to decide applicability and what read-only rules strip.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Alarm, Control, Display, NtError, NtResult, ScalarValue, Shape, TimeStamp, ValueAlarm};

/// Top-level fields of an `NtValue`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Field {
    Value = 0,
    Alarm = 1,
    TimeStamp = 2,
    Display = 3,
    Control = 4,
    ValueAlarm = 5,
    Extra = 6,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Value,
        Field::Alarm,
        Field::TimeStamp,
        Field::Display,
        Field::Control,
        Field::ValueAlarm,
        Field::Extra,
    ];

    #[inline]
    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Set of changed fields, a small bitset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMask(u8);

impl FieldMask {
    pub const EMPTY: FieldMask = FieldMask(0);

    pub fn empty() -> Self {
        FieldMask(0)
    }

    pub fn all() -> Self {
        let mut mask = FieldMask(0);
        for field in Field::ALL {
            mask.set(field);
        }
        mask
    }

    pub fn of(fields: &[Field]) -> Self {
        let mut mask = FieldMask(0);
        for &field in fields {
            mask.set(field);
        }
        mask
    }

    #[inline]
    pub fn set(&mut self, field: Field) {
        self.0 |= field.bit();
    }

    #[inline]
    pub fn clear(&mut self, field: Field) {
        self.0 &= !field.bit();
    }

    #[inline]
    pub fn contains(&self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

/// One structured PV state: payload plus optional sub-structures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NtValue {
    pub value: ScalarValue,
    #[serde(default)]
    pub alarm: Alarm,
    #[serde(default)]
    pub time_stamp: TimeStamp,
    #[serde(default)]
    pub display: Option<Display>,
    #[serde(default)]
    pub control: Option<Control>,
    #[serde(default)]
    pub value_alarm: Option<ValueAlarm>,
    /// Non-standard extra fields declared by the PV's type. Visible and
    /// writable through the normal write path.
    #[serde(default)]
    pub extra: BTreeMap<String, ScalarValue>,
    #[serde(default)]
    changed: FieldMask,
}

impl NtValue {
    /// New snapshot with every present field marked changed, as at open.
    pub fn new(value: impl Into<ScalarValue>) -> Self {
        NtValue {
            value: value.into(),
            alarm: Alarm::none(),
            time_stamp: TimeStamp::ZERO,
            display: None,
            control: None,
            value_alarm: None,
            extra: BTreeMap::new(),
            changed: FieldMask::all(),
        }
    }

    pub fn with_display(mut self, display: Display) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_value_alarm(mut self, value_alarm: ValueAlarm) -> Self {
        self.value_alarm = Some(value_alarm);
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    pub fn shape(&self) -> Shape {
        self.value.shape()
    }

    /// Validate the declared optional sub-structures. Called eagerly at PV
    /// construction so an invalid PV never opens.
    pub fn validate(&self) -> NtResult<()> {
        if let Some(control) = &self.control {
            control.validate()?;
        }
        if let Some(value_alarm) = &self.value_alarm {
            value_alarm.validate()?;
        }
        Ok(())
    }

    /// Whether a top-level field is present in this PV's declared type.
    /// Value, alarm and timeStamp are always present; the rest are optional.
    pub fn has_field(&self, field: Field) -> bool {
        match field {
            Field::Value | Field::Alarm | Field::TimeStamp => true,
            Field::Display => self.display.is_some(),
            Field::Control => self.control.is_some(),
            Field::ValueAlarm => self.value_alarm.is_some(),
            Field::Extra => !self.extra.is_empty(),
        }
    }

    /// Copy one field from `source` into this snapshot and unmark it.
    /// Used by read-only rules to strip caller changes to protected fields.
    pub fn restore_field(&mut self, source: &NtValue, field: Field) {
        match field {
            Field::Value => self.value = source.value.clone(),
            Field::Alarm => self.alarm = source.alarm.clone(),
            Field::TimeStamp => self.time_stamp = source.time_stamp,
            Field::Display => self.display = source.display.clone(),
            Field::Control => self.control = source.control,
            Field::ValueAlarm => self.value_alarm = source.value_alarm,
            Field::Extra => self.extra = source.extra.clone(),
        }
        self.changed.clear(field);
    }

    // --- change tracking ---

    #[inline]
    pub fn changed(&self, field: Field) -> bool {
        self.changed.contains(field)
    }

    #[inline]
    pub fn changed_mask(&self) -> FieldMask {
        self.changed
    }

    #[inline]
    pub fn mark(&mut self, field: Field) {
        self.changed.set(field);
    }

    #[inline]
    pub fn unmark(&mut self, field: Field) {
        self.changed.clear(field);
    }

    pub fn clear_marks(&mut self) {
        self.changed = FieldMask::empty();
    }

    /// Set the payload and mark it changed.
    pub fn set_value(&mut self, value: impl Into<ScalarValue>) {
        self.value = value.into();
        self.changed.set(Field::Value);
    }

    /// Set the alarm state and mark it changed.
    pub fn set_alarm(&mut self, alarm: Alarm) {
        self.alarm = alarm;
        self.changed.set(Field::Alarm);
    }

    /// Set the timestamp and mark it changed.
    pub fn set_time_stamp(&mut self, time_stamp: TimeStamp) {
        self.time_stamp = time_stamp;
        self.changed.set(Field::TimeStamp);
    }

    /// Set an extra field and mark the extras changed.
    pub fn set_extra(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) {
        self.extra.insert(name.into(), value.into());
        self.changed.set(Field::Extra);
    }

    /// Overlay the marked fields of `delta` onto this snapshot, producing
    /// the prospective next state. Unmarked fields keep the current values;
    /// the result's change mask is `delta`'s, so rules see exactly what the
    /// write touched.
    pub fn overlay(&self, delta: &NtValue) -> NtResult<NtValue> {
        if delta.changed(Field::Value) && delta.shape() != self.shape() {
            return Err(NtError::TypeMismatch {
                expected: self.shape(),
                actual: delta.shape(),
            });
        }

        let mut next = self.clone();
        next.changed = delta.changed;

        if delta.changed(Field::Value) {
            next.value = delta.value.clone();
        }
        if delta.changed(Field::Alarm) {
            next.alarm = delta.alarm.clone();
        }
        if delta.changed(Field::TimeStamp) {
            next.time_stamp = delta.time_stamp;
        }
        if delta.changed(Field::Display) {
            next.display = delta.display.clone();
        }
        if delta.changed(Field::Control) {
            next.control = delta.control;
        }
        if delta.changed(Field::ValueAlarm) {
            next.value_alarm = delta.value_alarm;
        }
        if delta.changed(Field::Extra) {
            for (name, value) in &delta.extra {
                next.extra.insert(name.clone(), value.clone());
            }
        }

        Ok(next)
    }
}
