//! In-process `Store` used by the service and router tests. Every method
//! runs under one lock, which gives the same all-or-nothing behaviour the
//! Postgres transactions give.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Error;
use uuid::Uuid;

use super::{
    jobdb::{ApplicationExt, JobExt},
    notificationdb::NotificationExt,
    ratedb::{still_rateable, RateExt, RateInsert},
    taxonomydb::{TaxonomyExt, MAX_TAXONOMY_DEPTH},
    userdb::UserExt,
};
use crate::{
    models::{
        jobmodel::*,
        notificationmodel::{Device, NewNotification, NotificationView, PushNotification},
        ratemodel::{NewRate, Rate},
        taxonomymodel::{Location, LocationMembership, Service},
        usermodel::{NewUser, RecordState, User, UserRole},
    },
    rules::{
        application::{resolve_competitors, AcceptancePlan},
        rating::average,
    },
};

#[derive(Debug, Default)]
pub struct MemoryState {
    pub users: Vec<User>,
    pub jobs: Vec<Job>,
    pub job_services: Vec<(Uuid, Uuid)>,
    pub applications: Vec<Application>,
    pub rates: Vec<Rate>,
    pub devices: Vec<Device>,
    pub notifications: Vec<PushNotification>,
    /// (notification, device, recipient user)
    pub notification_devices: Vec<(Uuid, Uuid, Uuid)>,
    pub notification_reads: Vec<(Uuid, Uuid)>,
    pub services: Vec<Service>,
    pub locations: Vec<Location>,
    pub user_locations: Vec<LocationMembership>,
    pub user_services: Vec<(Uuid, Uuid)>,
}

impl MemoryState {
    /// Active notifications recorded as sent to `user_id`.
    fn inbox(&self, user_id: Uuid) -> impl Iterator<Item = &PushNotification> + '_ {
        self.notifications.iter().filter(move |n| {
            n.record_state == RecordState::Active
                && self
                    .notification_devices
                    .iter()
                    .any(|(nid, _, uid)| *nid == n.id && *uid == user_id)
        })
    }

    fn active_user(&self, user_id: Uuid) -> bool {
        self.users
            .iter()
            .any(|u| u.id == user_id && u.record_state == RecordState::Active)
    }

    fn refresh_average_rate(&mut self, user_id: Uuid) -> Option<f64> {
        let rates: Vec<i32> = self
            .rates
            .iter()
            .filter(|r| r.receiver_id == user_id && r.record_state == RecordState::Active)
            .map(|r| r.rate)
            .collect();

        let avg = average(&rates)?;
        if let Some(user) = self.users.iter_mut().find(|u| u.id == user_id) {
            user.average_rate = avg;
            user.updated_at = Utc::now();
        }
        Some(avg)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store lock poisoned")
    }

    pub fn seed_location(&self, name: &str, parent_id: Option<Uuid>) -> Location {
        let location = Location {
            id: Uuid::new_v4(),
            parent_id,
            name: name.to_string(),
            record_state: RecordState::Active,
        };
        self.lock().locations.push(location.clone());
        location
    }

    pub fn seed_service(&self, name: &str, parent_id: Option<Uuid>) -> Service {
        let service = Service {
            id: Uuid::new_v4(),
            parent_id,
            name: name.to_string(),
            record_state: RecordState::Active,
        };
        self.lock().services.push(service.clone());
        service
    }

    pub fn promote_to_admin(&self, user_id: Uuid) {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == user_id) {
            user.role = UserRole::Admin;
        }
    }
}

#[async_trait]
impl UserExt for MemoryStore {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<User>, Error> {
        let state = self.lock();
        let found = state
            .users
            .iter()
            .filter(|u| u.record_state == RecordState::Active)
            .find(|u| {
                if let Some(user_id) = user_id {
                    u.id == user_id
                } else if let Some(email) = email {
                    u.email.as_deref().map(|e| e.eq_ignore_ascii_case(email)).unwrap_or(false)
                } else if let Some(phone) = phone {
                    u.phone.as_deref() == Some(phone)
                } else {
                    false
                }
            })
            .cloned();
        Ok(found)
    }

    async fn save_user(&self, new_user: NewUser) -> Result<User, Error> {
        let mut state = self.lock();
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            phone: new_user.phone,
            password: new_user.password,
            role: UserRole::User,
            average_rate: 0.0,
            avatar_key: None,
            avatar_url: None,
            oauth_issuer: new_user.oauth_issuer,
            record_state: RecordState::Active,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<User, Error> {
        let mut state = self.lock();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id && u.record_state == RecordState::Active)
            .ok_or(Error::RowNotFound)?;

        if let Some(name) = name {
            user.name = name;
        }
        if email.is_some() {
            user.email = email;
        }
        if phone.is_some() {
            user.phone = phone;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_user_avatar(
        &self,
        user_id: Uuid,
        avatar_key: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User, Error> {
        let mut state = self.lock();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id && u.record_state == RecordState::Active)
            .ok_or(Error::RowNotFound)?;
        user.avatar_key = avatar_key;
        user.avatar_url = avatar_url;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn soft_delete_user(&self, user_id: Uuid) -> Result<(), Error> {
        let mut state = self.lock();
        for user in state.users.iter_mut().filter(|u| u.id == user_id) {
            user.record_state = RecordState::Deleted;
        }
        for device in state.devices.iter_mut().filter(|d| d.user_id == user_id) {
            device.record_state = RecordState::Deleted;
        }
        Ok(())
    }

    async fn get_user_ids_after(&self, after: Option<Uuid>, limit: i64) -> Result<Vec<Uuid>, Error> {
        let state = self.lock();
        let mut ids: Vec<Uuid> = state
            .users
            .iter()
            .filter(|u| u.record_state == RecordState::Active)
            .map(|u| u.id)
            .filter(|id| after.map(|a| *id > a).unwrap_or(true))
            .collect();
        ids.sort();
        ids.truncate(limit.max(0) as usize);
        Ok(ids)
    }
}

#[async_trait]
impl JobExt for MemoryStore {
    async fn create_job(&self, new_job: NewJob) -> Result<Job, Error> {
        let mut state = self.lock();
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            owner_id: new_job.owner_id,
            worker_id: None,
            title: new_job.title,
            description: new_job.description,
            cost: new_job.cost,
            address: new_job.address,
            location_id: new_job.location_id,
            status: JobStatus::Pending,
            record_state: RecordState::Active,
            created_at: now,
            updated_at: now,
        };
        for service_id in new_job.service_ids {
            state.job_services.push((job.id, service_id));
        }
        state.jobs.push(job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, Error> {
        let state = self.lock();
        Ok(state
            .jobs
            .iter()
            .find(|j| j.id == job_id && j.record_state == RecordState::Active)
            .cloned())
    }

    async fn get_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, Error> {
        let state = self.lock();
        let mut jobs: Vec<Job> = state
            .jobs
            .iter()
            .filter(|j| j.record_state == RecordState::Active)
            .filter(|j| filter.status.map(|s| j.status == s).unwrap_or(true))
            .filter(|j| filter.owner_id.map(|o| j.owner_id == o).unwrap_or(true))
            .filter(|j| match &filter.location_ids {
                Some(ids) => j.location_id.map(|l| ids.contains(&l)).unwrap_or(false),
                None => true,
            })
            .filter(|j| match filter.service_id {
                Some(service_id) => state.job_services.contains(&(j.id, service_id)),
                None => true,
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn get_job_service_ids(&self, job_id: Uuid) -> Result<Vec<Uuid>, Error> {
        let state = self.lock();
        Ok(state
            .job_services
            .iter()
            .filter(|(j, _)| *j == job_id)
            .map(|(_, s)| *s)
            .collect())
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Option<Job>, Error> {
        let mut state = self.lock();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == from && j.record_state == RecordState::Active);
        Ok(job.map(|job| {
            job.status = to;
            job.updated_at = Utc::now();
            job.clone()
        }))
    }

    async fn soft_delete_job(&self, job_id: Uuid, expected: JobStatus) -> Result<bool, Error> {
        let mut state = self.lock();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == expected && j.record_state == RecordState::Active);
        Ok(match job {
            Some(job) => {
                job.record_state = RecordState::Deleted;
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl ApplicationExt for MemoryStore {
    async fn create_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        application_type: ApplicationType,
    ) -> Result<Application, Error> {
        let mut state = self.lock();
        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            job_id,
            worker_id,
            application_type,
            status: ApplicationStatus::Pending,
            record_state: RecordState::Active,
            created_at: now,
            updated_at: now,
        };
        state.applications.push(application.clone());
        Ok(application)
    }

    async fn get_application(&self, application_id: Uuid) -> Result<Option<Application>, Error> {
        let state = self.lock();
        Ok(state
            .applications
            .iter()
            .find(|a| a.id == application_id && a.record_state == RecordState::Active)
            .cloned())
    }

    async fn get_job_applications(&self, job_id: Uuid) -> Result<Vec<Application>, Error> {
        let state = self.lock();
        Ok(state
            .applications
            .iter()
            .filter(|a| a.job_id == job_id && a.record_state == RecordState::Active)
            .cloned()
            .collect())
    }

    async fn get_pending_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Option<Application>, Error> {
        let state = self.lock();
        Ok(state
            .applications
            .iter()
            .find(|a| {
                a.job_id == job_id
                    && a.worker_id == worker_id
                    && a.status == ApplicationStatus::Pending
                    && a.record_state == RecordState::Active
            })
            .cloned())
    }

    async fn accept_application(&self, plan: &AcceptancePlan) -> Result<Option<AcceptanceOutcome>, Error> {
        let mut state = self.lock();
        let now = Utc::now();

        let Some(job_idx) = state.jobs.iter().position(|j| {
            j.id == plan.job_id
                && j.status == JobStatus::Pending
                && j.worker_id.is_none()
                && j.record_state == RecordState::Active
        }) else {
            return Ok(None);
        };

        let Some(app_idx) = state.applications.iter().position(|a| {
            a.id == plan.application_id
                && a.job_id == plan.job_id
                && a.status == ApplicationStatus::Pending
                && a.record_state == RecordState::Active
        }) else {
            return Ok(None);
        };

        state.applications[app_idx].status = ApplicationStatus::Accepted;
        state.applications[app_idx].updated_at = now;
        let accepted = state.applications[app_idx].clone();

        let siblings: Vec<Application> = state
            .applications
            .iter()
            .filter(|a| a.job_id == plan.job_id && a.record_state == RecordState::Active)
            .cloned()
            .collect();
        let losers = resolve_competitors(accepted.id, plan.job_id, &siblings);

        let mut rejected = Vec::new();
        for application in state.applications.iter_mut().filter(|a| losers.contains(&a.id)) {
            application.status = ApplicationStatus::Rejected;
            application.updated_at = now;
            rejected.push(application.clone());
        }

        let job = &mut state.jobs[job_idx];
        job.status = JobStatus::InProgress;
        job.worker_id = Some(plan.worker_id);
        job.updated_at = now;
        let job = job.clone();

        Ok(Some(AcceptanceOutcome {
            application: accepted,
            job,
            rejected,
        }))
    }

    async fn reject_application(&self, application_id: Uuid) -> Result<Option<Application>, Error> {
        let mut state = self.lock();
        let application = state.applications.iter_mut().find(|a| {
            a.id == application_id
                && a.status == ApplicationStatus::Pending
                && a.record_state == RecordState::Active
        });
        Ok(application.map(|a| {
            a.status = ApplicationStatus::Rejected;
            a.updated_at = Utc::now();
            a.clone()
        }))
    }
}

#[async_trait]
impl RateExt for MemoryStore {
    async fn get_rate_by_job_and_giver(&self, job_id: Uuid, gives_id: Uuid) -> Result<Option<Rate>, Error> {
        let state = self.lock();
        Ok(state
            .rates
            .iter()
            .find(|r| r.job_id == job_id && r.gives_id == gives_id && r.record_state == RecordState::Active)
            .cloned())
    }

    async fn get_received_rates(&self, receiver_id: Uuid) -> Result<Vec<Rate>, Error> {
        let state = self.lock();
        Ok(state
            .rates
            .iter()
            .filter(|r| r.receiver_id == receiver_id && r.record_state == RecordState::Active)
            .cloned()
            .collect())
    }

    async fn create_rate(&self, new_rate: &NewRate) -> Result<RateInsert, Error> {
        let mut state = self.lock();

        let Some(job_idx) = state
            .jobs
            .iter()
            .position(|j| j.id == new_rate.job_id && j.record_state == RecordState::Active)
        else {
            return Err(Error::RowNotFound);
        };
        if !still_rateable(&state.jobs[job_idx], new_rate) {
            return Ok(RateInsert::NotRateable);
        }

        let duplicate = state.rates.iter().any(|r| {
            r.job_id == new_rate.job_id
                && r.gives_id == new_rate.gives_id
                && r.record_state == RecordState::Active
        });
        if duplicate {
            return Ok(RateInsert::Duplicate);
        }

        let rate = Rate {
            id: Uuid::new_v4(),
            job_id: new_rate.job_id,
            gives_id: new_rate.gives_id,
            receiver_id: new_rate.receiver_id,
            rate: new_rate.rate,
            review: new_rate.review.clone(),
            record_state: RecordState::Active,
            created_at: Utc::now(),
        };
        state.rates.push(rate.clone());

        let job = &mut state.jobs[job_idx];
        if new_rate.complete_job
            && matches!(job.status, JobStatus::InProgress | JobStatus::OnConfirmation)
        {
            job.status = JobStatus::Completed;
            job.updated_at = Utc::now();
        }

        state.refresh_average_rate(new_rate.receiver_id);
        Ok(RateInsert::Created(rate))
    }

    async fn recompute_average_rate(&self, user_id: Uuid) -> Result<Option<f64>, Error> {
        Ok(self.lock().refresh_average_rate(user_id))
    }
}

#[async_trait]
impl NotificationExt for MemoryStore {
    async fn register_device(
        &self,
        user_id: Uuid,
        push_token: &str,
        platform: Option<String>,
    ) -> Result<Device, Error> {
        let mut state = self.lock();
        if let Some(device) = state.devices.iter_mut().find(|d| d.push_token == push_token) {
            device.user_id = user_id;
            device.platform = platform;
            device.record_state = RecordState::Active;
            return Ok(device.clone());
        }

        let device = Device {
            id: Uuid::new_v4(),
            user_id,
            push_token: push_token.to_string(),
            platform,
            record_state: RecordState::Active,
            created_at: Utc::now(),
        };
        state.devices.push(device.clone());
        Ok(device)
    }

    async fn get_devices_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<Device>, Error> {
        let state = self.lock();
        Ok(state
            .devices
            .iter()
            .filter(|d| user_ids.contains(&d.user_id) && d.record_state == RecordState::Active)
            .cloned()
            .collect())
    }

    async fn deactivate_devices(&self, push_tokens: &[String]) -> Result<u64, Error> {
        let mut state = self.lock();
        let mut affected = 0;
        for device in state
            .devices
            .iter_mut()
            .filter(|d| push_tokens.contains(&d.push_token) && d.record_state == RecordState::Active)
        {
            device.record_state = RecordState::Deleted;
            affected += 1;
        }
        Ok(affected)
    }

    async fn create_notification(&self, draft: &NewNotification) -> Result<PushNotification, Error> {
        let mut state = self.lock();
        let notification = PushNotification {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            notification_type: draft.notification_type,
            job_id: draft.job_id,
            record_state: RecordState::Active,
            created_at: Utc::now(),
        };
        for recipient in &draft.recipients {
            state
                .notification_devices
                .push((notification.id, recipient.device_id, recipient.user_id));
        }
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationView>, Error> {
        let state = self.lock();
        let mut views: Vec<NotificationView> = state
            .inbox(user_id)
            .filter(|n| !unread_only || !state.notification_reads.contains(&(n.id, user_id)))
            .map(|n| NotificationView {
                id: n.id,
                title: n.title.clone(),
                content: n.content.clone(),
                notification_type: n.notification_type,
                job_id: n.job_id,
                is_read: state.notification_reads.contains(&(n.id, user_id)),
                created_at: n.created_at,
            })
            .collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(views
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn get_notification_for_user(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PushNotification>, Error> {
        let state = self.lock();
        let found = state.inbox(user_id).find(|n| n.id == notification_id).cloned();
        Ok(found)
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> Result<i64, Error> {
        let state = self.lock();
        let unread = state
            .inbox(user_id)
            .filter(|n| !state.notification_reads.contains(&(n.id, user_id)))
            .count();
        Ok(unread as i64)
    }

    async fn mark_notification_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<(), Error> {
        let mut state = self.lock();
        if !state.notification_reads.contains(&(notification_id, user_id)) {
            state.notification_reads.push((notification_id, user_id));
        }
        Ok(())
    }
}

#[async_trait]
impl TaxonomyExt for MemoryStore {
    async fn get_services(&self) -> Result<Vec<Service>, Error> {
        let state = self.lock();
        Ok(state
            .services
            .iter()
            .filter(|s| s.record_state == RecordState::Active)
            .cloned()
            .collect())
    }

    async fn get_locations(&self) -> Result<Vec<Location>, Error> {
        let state = self.lock();
        Ok(state
            .locations
            .iter()
            .filter(|l| l.record_state == RecordState::Active)
            .cloned()
            .collect())
    }

    async fn get_service_path(&self, service_id: Uuid) -> Result<Vec<Service>, Error> {
        let state = self.lock();
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(service_id);

        while let Some(id) = next {
            if path.len() as i32 > MAX_TAXONOMY_DEPTH || !visited.insert(id) {
                break;
            }
            let Some(service) = state
                .services
                .iter()
                .find(|s| s.id == id && s.record_state == RecordState::Active)
            else {
                break;
            };
            next = service.parent_id;
            path.push(service.clone());
        }

        path.reverse();
        Ok(path)
    }

    async fn get_location_subtree_ids(&self, location_id: Uuid) -> Result<Vec<Uuid>, Error> {
        let state = self.lock();
        let active = |id: &Uuid| {
            state
                .locations
                .iter()
                .any(|l| l.id == *id && l.record_state == RecordState::Active)
        };
        if !active(&location_id) {
            return Ok(Vec::new());
        }

        let mut found = vec![location_id];
        let mut frontier = vec![location_id];
        let mut depth = 0;
        while !frontier.is_empty() && depth < MAX_TAXONOMY_DEPTH {
            let children: Vec<Uuid> = state
                .locations
                .iter()
                .filter(|l| l.record_state == RecordState::Active)
                .filter(|l| l.parent_id.map(|p| frontier.contains(&p)).unwrap_or(false))
                .map(|l| l.id)
                .filter(|id| !found.contains(id))
                .collect();
            found.extend(children.iter().copied());
            frontier = children;
            depth += 1;
        }
        Ok(found)
    }

    async fn get_existing_service_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, Error> {
        let state = self.lock();
        Ok(state
            .services
            .iter()
            .filter(|s| ids.contains(&s.id) && s.record_state == RecordState::Active)
            .map(|s| s.id)
            .collect())
    }

    async fn get_existing_location_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, Error> {
        let state = self.lock();
        Ok(state
            .locations
            .iter()
            .filter(|l| ids.contains(&l.id) && l.record_state == RecordState::Active)
            .map(|l| l.id)
            .collect())
    }

    async fn get_location_memberships(&self, location_ids: &[Uuid]) -> Result<Vec<LocationMembership>, Error> {
        let state = self.lock();
        Ok(state
            .user_locations
            .iter()
            .filter(|m| location_ids.contains(&m.location_id) && state.active_user(m.user_id))
            .copied()
            .collect())
    }

    async fn get_user_location_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, Error> {
        let state = self.lock();
        Ok(state
            .user_locations
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.location_id)
            .collect())
    }

    async fn set_user_locations(&self, user_id: Uuid, location_ids: &[Uuid]) -> Result<(), Error> {
        let mut state = self.lock();
        state.user_locations.retain(|m| m.user_id != user_id);
        for location_id in location_ids {
            let membership = LocationMembership { user_id, location_id: *location_id };
            if !state.user_locations.contains(&membership) {
                state.user_locations.push(membership);
            }
        }
        Ok(())
    }

    async fn get_user_service_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, Error> {
        let state = self.lock();
        Ok(state
            .user_services
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, s)| *s)
            .collect())
    }

    async fn set_user_services(&self, user_id: Uuid, service_ids: &[Uuid]) -> Result<(), Error> {
        let mut state = self.lock();
        state.user_services.retain(|(u, _)| *u != user_id);
        for service_id in service_ids {
            if !state.user_services.contains(&(user_id, *service_id)) {
                state.user_services.push((user_id, *service_id));
            }
        }
        Ok(())
    }
}
