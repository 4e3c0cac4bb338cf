use dcs_core::{CheckinRules, CoreError, CoreResult, LocalMirror};
use dcs_shared::{BaggagePiece, BaggageRecord, Flight};

/// Issues bag tags from the device-local counter.
///
/// The counter only moves forward on this device; two counters on two
/// devices can hand out the same number.
#[derive(Clone)]
pub struct BagTagSequence {
    mirror: LocalMirror,
}

/// `AV123/MAD/0042`
pub fn format_tag(flight_number: &str, destination: &str, number: u64) -> String {
    format!("{}/{}/{:04}", flight_number, destination, number)
}

impl BagTagSequence {
    pub fn new(mirror: LocalMirror) -> Self {
        Self { mirror }
    }

    pub async fn next_tag(&self, flight: &Flight) -> CoreResult<String> {
        let number = self.mirror.next_bag_tag_number().await?;
        Ok(format_tag(&flight.flight_number, &flight.destination, number))
    }

    /// Tags every weight (kilograms) and returns the resulting record.
    pub async fn tag_all(
        &self,
        flight: &Flight,
        weights: &[f64],
        rules: &CheckinRules,
    ) -> CoreResult<BaggageRecord> {
        validate_weights(weights, rules)?;

        let mut record = BaggageRecord::default();
        for weight in weights {
            let tag = self.next_tag(flight).await?;
            record.push(BaggagePiece {
                tag,
                weight: *weight,
            });
        }
        Ok(record)
    }
}

pub fn validate_weights(weights: &[f64], rules: &CheckinRules) -> CoreResult<()> {
    for (idx, weight) in weights.iter().enumerate() {
        if !weight.is_finite() || *weight <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Bag {} has an invalid weight",
                idx + 1
            )));
        }
        if *weight > rules.max_bag_weight {
            return Err(CoreError::ValidationError(format!(
                "Bag {} weighs {:.1} kg, above the {:.1} kg limit",
                idx + 1,
                weight,
                rules.max_bag_weight
            )));
        }
    }
    Ok(())
}
