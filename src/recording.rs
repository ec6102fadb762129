//! ECG recordings as named leads of millivolt samples, with lead-name
//! standardisation and layout ordering.

use crate::error::InputError;

/// One channel of a recording, in millivolts. NaN marks missing samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Lead {
    pub name: String,
    pub samples: Vec<f64>,
}

impl Lead {
    pub fn new(name: impl Into<String>, samples: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }
}

/// A multi-lead recording sharing one sampling rate.
#[derive(Debug, Clone)]
pub struct Recording {
    name: String,
    sample_rate: f64,
    leads: Vec<Lead>,
}

impl Recording {
    pub fn new(name: impl Into<String>, sample_rate: f64, leads: Vec<Lead>) -> Result<Self, InputError> {
        let name = name.into();
        if !(sample_rate > 0.0 && sample_rate.is_finite()) {
            return Err(InputError::SampleRate {
                name,
                rate: sample_rate,
            });
        }
        if leads.is_empty() {
            return Err(InputError::NoLeads(name));
        }
        Ok(Self {
            name,
            sample_rate,
            leads,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn lead(&self, name: &str) -> Option<&Lead> {
        self.leads.iter().find(|l| l.name == name)
    }

    pub fn lead_names(&self) -> Vec<&str> {
        self.leads.iter().map(|l| l.name.as_str()).collect()
    }

    /// Rename every lead to its standard spelling.
    pub fn standardize_lead_names(mut self) -> Self {
        for lead in &mut self.leads {
            lead.name = standardize_lead_name(&lead.name);
        }
        self
    }

    /// Keep only the leads named in `desired_order`, in that order.
    ///
    /// Names absent from the recording are ignored. If nothing matches the
    /// recording is returned unchanged.
    pub fn reorder(mut self, desired_order: &[String]) -> Self {
        let mut ordered = Vec::with_capacity(desired_order.len());
        for name in desired_order {
            if let Some(pos) = self.leads.iter().position(|l| &l.name == name) {
                ordered.push(self.leads.swap_remove(pos));
            }
        }
        if ordered.is_empty() {
            log::warn!(
                "{}: none of the desired leads are present, keeping recorded order",
                self.name
            );
            return self;
        }
        self.leads = ordered;
        self
    }

    /// Lead to show as the rhythm strip.
    ///
    /// Only twelve-lead recordings get a rhythm strip. When the requested
    /// lead is missing the first lead is used instead.
    pub fn rhythm_lead(&self, requested: Option<&str>) -> Option<&str> {
        let requested = requested?;
        if self.leads.len() != 12 {
            return None;
        }
        match self.lead(requested) {
            Some(lead) => Some(lead.name.as_str()),
            None => self.leads.first().map(|l| l.name.as_str()),
        }
    }
}

/// Upper-case a lead name, keeping the lower-case `a` of augmented limb leads.
pub fn standardize_lead_name(name: &str) -> String {
    let upper = name.trim().to_uppercase();
    match upper.as_str() {
        "AVR" => "aVR".to_string(),
        "AVL" => "aVL".to_string(),
        "AVF" => "aVF".to_string(),
        _ => upper,
    }
}

/// Standard twelve-lead order.
pub const STANDARD_LEADS: [&str; 12] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
];
