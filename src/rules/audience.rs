use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{
    jobmodel::Job,
    notificationmodel::{DeliveryReport, Device, TicketOutcome},
    taxonomymodel::LocationMembership,
    usermodel::RecordState,
};

/// Users living in the job's location, minus the owner. Order follows
/// `memberships`, without duplicates.
pub fn select_job_audience(job: &Job, memberships: &[LocationMembership]) -> Vec<Uuid> {
    let Some(location_id) = job.location_id else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    memberships
        .iter()
        .filter(|m| m.location_id == location_id)
        .map(|m| m.user_id)
        .filter(|user_id| *user_id != job.owner_id)
        .filter(|user_id| seen.insert(*user_id))
        .collect()
}

/// Fan-out unit is the device: every active device owned by the audience,
/// one entry per push token.
pub fn select_devices(audience: &[Uuid], devices: &[Device]) -> Vec<Device> {
    let audience: HashSet<&Uuid> = audience.iter().collect();
    let mut tokens = HashSet::new();

    devices
        .iter()
        .filter(|d| d.record_state == RecordState::Active)
        .filter(|d| audience.contains(&d.user_id))
        .filter(|d| tokens.insert(d.push_token.clone()))
        .cloned()
        .collect()
}

/// Pairs each token with the gateway's outcome for it. Tokens the gateway
/// did not answer for count as failed.
pub fn summarize_delivery(tokens: &[String], outcomes: &[TicketOutcome]) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for (i, token) in tokens.iter().enumerate() {
        match outcomes.get(i) {
            Some(TicketOutcome::Delivered) => report.delivered += 1,
            Some(TicketOutcome::DeviceNotRegistered) => {
                report.failed += 1;
                report.unregistered.push(token.clone());
            }
            Some(TicketOutcome::Failed(_)) | None => report.failed += 1,
        }
    }

    report
}
