//! Guest and host message texts.

use slotbook_core::inquiry::Inquiry;
use slotbook_core::notification::{Audience, Notification};
use slotbook_core::service::Service;

/// Booking confirmation for the guest and booking notice for the host.
#[must_use]
pub fn booking_notifications(inquiry: &Inquiry, service: &Service) -> Vec<Notification> {
    let code = inquiry
        .confirmation_code
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();

    let guest = format!(
        "Hi {name}, Berikut adalah kode konfirmasimu [{code}] untuk pemesanan di {title}!\n\
         Bila membutuhkan informasi, bisa menghubungi {host} di +{host_phone},\n\n\
         Selamat liburan! 😊",
        name = inquiry.contact.full_name,
        title = service.title,
        host = service.host.name,
        host_phone = service.host.phone_number,
    );

    let dates: Vec<String> = inquiry.selected_dates.iter().map(ToString::to_string).collect();
    let host = format!(
        "Hi {host}\n\n\
         {guest} telah melakukan pemesanan {title} di tanggal berikut [{dates}].\n\
         Nomor kontakmu sudah dibagikan kepada tamu, \
         selalu siap barangkali tamu menghubungi kamu ya! 😊",
        host = service.host.name,
        guest = inquiry.contact.full_name,
        title = service.title,
        dates = dates.join(", "),
    );

    vec![
        Notification {
            audience: Audience::Guest,
            destination: inquiry.contact.phone_number.clone(),
            text: guest,
        },
        Notification {
            audience: Audience::Host,
            destination: service.host.phone_number.clone(),
            text: host,
        },
    ]
}

/// Payment link sent right after an inquiry is created.
#[must_use]
pub fn payment_link_notification(
    inquiry: &Inquiry,
    service: &Service,
    payment_link: &str,
    status_page_base: &str,
) -> Notification {
    let text = format!(
        "Halo {name},\n\
         Berikut adalah link pembayaranmu untuk pemesanan {title} sebesar Rp{total}\n\n\
         {payment_link}\n\n\
         Lakukan pembayaran sebelum 24 jam.\n\n\
         Cek status pembayaranmu di sini:\n\
         {base}/bookings/{id}",
        name = inquiry.contact.full_name,
        title = service.title,
        total = group_thousands(inquiry.total_payment),
        base = status_page_base.trim_end_matches('/'),
        id = inquiry.id,
    );
    Notification {
        audience: Audience::Guest,
        destination: inquiry.contact.phone_number.clone(),
        text,
    }
}

/// `1234567` -> `"1,234,567"`.
#[must_use]
pub fn group_thousands(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
