//! Inquiry submission and lookup.

use crate::app::Repositories;
use crate::app::contact::{
    ContactError, MaskedContact, normalise_phone, validate_email, validate_full_name,
};
use crate::app::messages::payment_link_notification;
use crate::metrics;
use serde::{Deserialize, Serialize};
use slotbook_core::environment::Clock;
use slotbook_core::ids::{ConfirmationCode, InquiryId};
use slotbook_core::inquiry::{ContactInfo, Inquiry, InquiryStatus};
use slotbook_core::service::{Service, ServiceVariant};
use slotbook_core::slot::{SelectedDate, SlotError, parse_dates};
use slotbook_core::store::{InquiryStore, NotificationOutbox, ServiceCatalog, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A guest's booking request, as submitted.
#[derive(Clone, Debug, Deserialize)]
pub struct InquiryRequest {
    /// Slug of the service being booked
    pub service_slug: String,
    /// Dates as `"YYYY/M/D"`
    pub selected_dates: Vec<String>,
    /// 1-based variant position
    pub selected_variant_id: String,
    /// Variant as the guest saw it
    #[serde(rename = "selected_variant_details")]
    pub selected_variant: ServiceVariant,
    /// Start hour, empty for whole-day services
    #[serde(default)]
    pub selected_hour: String,
    /// Guest name
    pub full_name: String,
    /// Guest phone number
    pub phone_number: String,
    /// Guest email
    pub email: String,
    /// Registered user, if signed in
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Inquiry as shown on the booking status page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InquiryDetails {
    /// Inquiry id
    pub id: InquiryId,
    /// Status label
    pub status: String,
    /// Status code
    pub status_code: u8,
    /// Confirmation code, once issued
    pub confirmation_code: Option<ConfirmationCode>,
    /// Selected dates
    pub selected_dates: Vec<SelectedDate>,
    /// Selected hour
    pub selected_hour: String,
    /// Variant snapshot
    pub selected_variant: ServiceVariant,
    /// Amount to pay
    pub total_payment: u64,
    /// Whether the guest may review now
    pub review_available: bool,
    /// Service title
    pub service_title: String,
    /// Service slug
    pub service_slug: String,
    /// Category path segment
    pub category: String,
    /// Host business name
    pub host_name: String,
    /// Measurement unit id
    pub measurement_unit_id: u8,
    /// Measurement unit label
    pub measurement_unit: String,
}

/// Errors from inquiry operations.
#[derive(Error, Debug)]
pub enum InquiryError {
    /// No service with that slug or id
    #[error("Service {0} not found")]
    ServiceNotFound(String),

    /// No inquiry with that id
    #[error("Inquiry {0} not found")]
    InquiryNotFound(InquiryId),

    /// A field is missing or malformed
    #[error("{0}")]
    Validation(String),

    /// The submitted variant no longer matches the catalog
    #[error("Harga atau detail varian telah berubah, silakan muat ulang halaman")]
    PriceChanged,

    /// The hour is not offered for the service's measurement unit
    #[error("Jam '{0}' tidak tersedia untuk layanan ini")]
    HourNotAvailable(String),

    /// Persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SlotError> for InquiryError {
    fn from(err: SlotError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ContactError> for InquiryError {
    fn from(err: ContactError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Inquiry use cases.
#[derive(Clone)]
pub struct InquiryService {
    inquiries: Arc<dyn InquiryStore>,
    services: Arc<dyn ServiceCatalog>,
    outbox: Arc<dyn NotificationOutbox>,
    clock: Arc<dyn Clock>,
    payment_link_base: String,
    status_page_base: String,
}

impl InquiryService {
    /// Create the service.
    #[must_use]
    pub fn new(
        repositories: &Repositories,
        clock: Arc<dyn Clock>,
        payment_link_base: impl Into<String>,
        status_page_base: impl Into<String>,
    ) -> Self {
        Self {
            inquiries: repositories.inquiries.clone(),
            services: repositories.services.clone(),
            outbox: repositories.outbox.clone(),
            clock,
            payment_link_base: payment_link_base.into(),
            status_page_base: status_page_base.into(),
        }
    }

    /// Validate and store a new inquiry awaiting payment, then queue the
    /// payment link for the guest.
    ///
    /// # Errors
    ///
    /// - [`InquiryError::ServiceNotFound`] for an unknown slug
    /// - [`InquiryError::Validation`], [`InquiryError::PriceChanged`] or
    ///   [`InquiryError::HourNotAvailable`] for a bad request
    /// - [`InquiryError::Store`] if the inquiry cannot be stored
    #[tracing::instrument(skip(self, request), fields(service_slug = %request.service_slug))]
    pub async fn create_inquiry(&self, request: InquiryRequest) -> Result<InquiryId, InquiryError> {
        let fields = [
            ("service_slug", &request.service_slug),
            ("selected_variant_id", &request.selected_variant_id),
            ("full_name", &request.full_name),
            ("phone_number", &request.phone_number),
            ("email", &request.email),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(InquiryError::Validation(format!("{name} wajib diisi")));
        }
        if request.selected_dates.is_empty() {
            return Err(InquiryError::Validation("Pilih minimal satu tanggal".to_string()));
        }
        let selected_dates = parse_dates(&request.selected_dates)?;
        let phone_number = normalise_phone(&request.phone_number)?;
        let full_name = validate_full_name(&request.full_name)?;
        let email = validate_email(&request.email)?;

        let service = self
            .services
            .get_by_slug(&request.service_slug)
            .await?
            .ok_or_else(|| InquiryError::ServiceNotFound(request.service_slug.clone()))?;

        let variant = *service
            .variant_by_position(&request.selected_variant_id)
            .ok_or_else(|| {
                let position = &request.selected_variant_id;
                InquiryError::Validation(format!("Varian {position} tidak ditemukan"))
            })?;
        if !variant.matches_snapshot(&request.selected_variant) {
            return Err(InquiryError::PriceChanged);
        }
        let selected_hour = service
            .measurement_unit
            .hour_slot(&request.selected_hour)
            .ok_or_else(|| InquiryError::HourNotAvailable(request.selected_hour.clone()))?;

        let now = self.clock.now();
        let days = u64::try_from(selected_dates.len()).unwrap_or(u64::MAX);
        let total_payment = variant.price.saturating_mul(days);
        let inquiry = Inquiry {
            id: InquiryId::new(),
            service_id: service.id.clone(),
            selected_dates,
            selected_variant_id: request.selected_variant_id.trim().to_string(),
            selected_variant: variant,
            selected_hour,
            contact: ContactInfo {
                full_name,
                phone_number,
                email,
            },
            user_id: request.user_id.filter(|id| !id.is_empty()),
            status: InquiryStatus::AwaitingPayment,
            confirmation_code: None,
            review_made: false,
            total_payment,
            measurement_unit: service.measurement_unit,
            created_at: now,
            updated_at: now,
        };

        self.inquiries.insert(inquiry.clone()).await?;
        metrics::record_inquiry_created();
        info!(inquiry_id = %inquiry.id, total_payment, "Inquiry created");

        self.send_payment_link(&inquiry, &service).await;
        Ok(inquiry.id)
    }

    async fn send_payment_link(&self, inquiry: &Inquiry, service: &Service) {
        let link = format!("{}/{}", self.payment_link_base.trim_end_matches('/'), inquiry.id);
        let notification =
            payment_link_notification(inquiry, service, &link, &self.status_page_base);
        if let Err(e) = self.outbox.enqueue(vec![notification]).await {
            warn!(inquiry_id = %inquiry.id, error = %e, "Failed to queue payment link");
        }
    }

    /// Load the status-page view of an inquiry.
    ///
    /// # Errors
    ///
    /// Returns [`InquiryError::InquiryNotFound`] / [`InquiryError::ServiceNotFound`]
    /// for missing documents, or [`InquiryError::Store`].
    pub async fn get_inquiry(&self, id: &InquiryId) -> Result<InquiryDetails, InquiryError> {
        let inquiry = self.load(id).await?;
        let service = self
            .services
            .get(&inquiry.service_id)
            .await?
            .ok_or_else(|| InquiryError::ServiceNotFound(inquiry.service_id.to_string()))?;

        Ok(InquiryDetails {
            review_available: inquiry.review_available(self.clock.now()),
            id: inquiry.id,
            status: inquiry.status.to_string(),
            status_code: inquiry.status.code(),
            confirmation_code: inquiry.confirmation_code,
            selected_dates: inquiry.selected_dates,
            selected_hour: inquiry.selected_hour.to_string(),
            selected_variant: inquiry.selected_variant,
            total_payment: inquiry.total_payment,
            service_title: service.title,
            service_slug: service.slug,
            category: service.category.path().to_string(),
            host_name: service.host.name,
            measurement_unit_id: inquiry.measurement_unit.id(),
            measurement_unit: inquiry.measurement_unit.label().to_string(),
        })
    }

    /// Contact details of an inquiry with most characters hidden.
    ///
    /// # Errors
    ///
    /// Returns [`InquiryError::InquiryNotFound`] or [`InquiryError::Store`].
    pub async fn masked_contact(&self, id: &InquiryId) -> Result<MaskedContact, InquiryError> {
        let inquiry = self.load(id).await?;
        Ok(MaskedContact::from(&inquiry.contact))
    }

    async fn load(&self, id: &InquiryId) -> Result<Inquiry, InquiryError> {
        self.inquiries
            .get(id)
            .await?
            .ok_or_else(|| InquiryError::InquiryNotFound(id.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use slotbook_testing::{FixedClock, InMemoryDocumentStore, fixtures};

    fn setup() -> (InMemoryDocumentStore, FixedClock, InquiryService) {
        let store = InMemoryDocumentStore::new();
        store.add_service(fixtures::service());
        store.add_service(fixtures::hourly_service());
        let clock = FixedClock::new(fixtures::created_at());
        let service = InquiryService::new(
            &Repositories::from_store(store.clone()),
            Arc::new(clock.clone()),
            "https://pay.example/checkout",
            "https://slotbook.example",
        );
        (store, clock, service)
    }

    fn request(slug: &str, dates: &[&str], hour: &str) -> InquiryRequest {
        InquiryRequest {
            service_slug: slug.to_string(),
            selected_dates: dates.iter().map(ToString::to_string).collect(),
            selected_variant_id: "1".to_string(),
            selected_variant: fixtures::variant(2, 150_000),
            selected_hour: hour.to_string(),
            full_name: "Ayu Lestari".to_string(),
            phone_number: "081234567890".to_string(),
            email: "ayu@example.com".to_string(),
            user_id: Some("user-1".to_string()),
        }
    }

    #[tokio::test]
    async fn creates_inquiry_and_queues_payment_link() {
        let (store, _clock, service) = setup();
        let id = service
            .create_inquiry(request("sunrise-snorkeling", &["2025/6/10", "2025/06/11"], ""))
            .await
            .unwrap();

        let inquiry = store.inquiry(&id).unwrap();
        assert_eq!(inquiry.status, InquiryStatus::AwaitingPayment);
        assert_eq!(inquiry.total_payment, 300_000);
        assert_eq!(inquiry.contact.phone_number, "6281234567890");
        assert_eq!(inquiry.selected_hour.as_str(), "00:00");

        let outbox = store.outbox();
        assert_eq!(outbox.len(), 1);
        assert!(
            outbox[0]
                .0
                .notification
                .text
                .contains(&format!("https://pay.example/checkout/{id}"))
        );
    }

    #[tokio::test]
    async fn hourly_service_needs_a_valid_hour() {
        let (_store, _clock, service) = setup();

        let err = service
            .create_inquiry(request("surf-lesson", &["2025/6/10"], ""))
            .await
            .unwrap_err();
        assert!(matches!(err, InquiryError::HourNotAvailable(_)));

        let err = service
            .create_inquiry(request("surf-lesson", &["2025/6/10"], "09:30"))
            .await
            .unwrap_err();
        assert!(matches!(err, InquiryError::HourNotAvailable(_)));

        let on_the_hour = request("surf-lesson", &["2025/6/10"], "09:00");
        assert!(service.create_inquiry(on_the_hour).await.is_ok());
    }

    #[tokio::test]
    async fn stale_variant_is_rejected() {
        let (_store, _clock, service) = setup();
        let mut stale = request("sunrise-snorkeling", &["2025/6/10"], "");
        stale.selected_variant.price = 120_000;

        let err = service.create_inquiry(stale).await.unwrap_err();
        assert!(matches!(err, InquiryError::PriceChanged));
    }

    #[tokio::test]
    async fn bad_input_is_a_validation_error() {
        let (store, _clock, service) = setup();

        let mut no_dates = request("sunrise-snorkeling", &[], "");
        no_dates.selected_dates.clear();
        let mut bad_phone = request("sunrise-snorkeling", &["2025/6/10"], "");
        bad_phone.phone_number = "12345".to_string();
        let mut no_name = request("sunrise-snorkeling", &["2025/6/10"], "");
        no_name.full_name = " ".to_string();
        let mut bad_email = request("sunrise-snorkeling", &["2025/6/10"], "");
        bad_email.email = "ayu@example".to_string();
        let mut odd_name = request("sunrise-snorkeling", &["2025/6/10"], "");
        odd_name.full_name = "Ayu 2".to_string();
        let mut unknown_variant = request("sunrise-snorkeling", &["2025/6/10"], "");
        unknown_variant.selected_variant_id = "9".to_string();

        for bad in [
            no_dates,
            bad_phone,
            no_name,
            bad_email,
            odd_name,
            unknown_variant,
            request("sunrise-snorkeling", &["2025/2/30"], ""),
        ] {
            let err = service.create_inquiry(bad).await.unwrap_err();
            assert!(matches!(err, InquiryError::Validation(_)), "unexpected {err:?}");
        }

        let err = service
            .create_inquiry(request("no-such-service", &["2025/6/10"], ""))
            .await
            .unwrap_err();
        assert!(matches!(err, InquiryError::ServiceNotFound(_)));
        assert!(store.outbox().is_empty());
    }

    #[tokio::test]
    async fn details_report_review_window() {
        let (store, clock, service) = setup();
        let mut inquiry = fixtures::confirmed_inquiry(&fixtures::service(), &["2025/6/10"]);
        inquiry.confirmation_code = Some(ConfirmationCode::from_string("ABC1234"));
        store.add_inquiry(inquiry.clone());

        let details = service.get_inquiry(&inquiry.id).await.unwrap();
        assert_eq!(details.status, "Kode Booking Terbit");
        assert_eq!(details.status_code, 3);
        assert_eq!(details.service_slug, "sunrise-snorkeling");
        assert!(!details.review_available);

        clock.advance(chrono::Duration::days(60));
        assert!(service.get_inquiry(&inquiry.id).await.unwrap().review_available);
    }

    #[tokio::test]
    async fn contact_is_masked() {
        let (store, _clock, service) = setup();
        let inquiry = fixtures::unpaid_inquiry(&fixtures::service(), &["2025/6/10"]);
        store.add_inquiry(inquiry.clone());

        let contact = service.masked_contact(&inquiry.id).await.unwrap();
        assert_eq!(contact.phone_number, "+628*******7890");
        assert_eq!(contact.email, "a*u@example.com");

        let err = service.masked_contact(&InquiryId::from_string("ghost")).await.unwrap_err();
        assert!(matches!(err, InquiryError::InquiryNotFound(_)));
    }
}
