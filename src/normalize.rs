//! Print normalization: free-text fields are upper-cased so the rendered
//! summary reads consistently regardless of how the form was typed.

use crate::registration::{ClaimRouting, ContactEntry, RegistrationRecord};

pub fn normalize_record(record: &RegistrationRecord) -> RegistrationRecord {
    RegistrationRecord {
        id: record.id.clone(),
        acp_name: upper(&record.acp_name),
        acp_address: upper(&record.acp_address),
        city: upper(&record.city),
        state: upper(&record.state),
        post_code: upper(&record.post_code),
        telephone_no: upper(&record.telephone_no),
        fax_no: upper(&record.fax_no),
        photo_url: record.photo_url.clone(),
        id_card_no: upper(&record.id_card_no),
        tax_id: upper(&record.tax_id),
        sbn_nib: upper(&record.sbn_nib),
        pkp: upper(&record.pkp),
        contacts: record.contacts.iter().map(normalize_contact).collect(),
        agreement: record.agreement,
        claim_routing: match &record.claim_routing {
            ClaimRouting::Distributor { name } => ClaimRouting::Distributor { name: upper(name) },
            ClaimRouting::MasterDealer { name } => ClaimRouting::MasterDealer { name: upper(name) },
        },
        created_at: record.created_at,
    }
}

fn normalize_contact(contact: &ContactEntry) -> ContactEntry {
    ContactEntry {
        role: contact.role,
        name: upper(&contact.name),
        mobile_phone: upper(&contact.mobile_phone),
        email: upper(&contact.email),
        whatsapp_no: upper(&contact.whatsapp_no),
    }
}

fn upper(value: &str) -> String {
    value.to_uppercase()
}
