use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const MAX_CONTACTS: usize = 4;

// ============================================================================
// WIRE SCHEMAS
// ============================================================================

/// Registration form as posted by the ACP registration page.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub acp_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub acp_address: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub post_code: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub telephone_no: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fax_no: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id_card_no: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tax_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sbn_nib: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pkp: String,
    #[serde(default)]
    pub contacts: Vec<ContactForm>,
    #[serde(default)]
    pub agreement: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub claim_credit_note_to: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub distributor_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub master_dealer_name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    #[serde(rename = "type")]
    pub role: ContactRole,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mobile_phone: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub whatsapp_no: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RsvpRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub company: String,
    pub attending: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfUrlPatch {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pdf_url: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ContactRole {
    #[default]
    Owner,
    #[serde(rename = "Contact 1")]
    Contact1,
    #[serde(rename = "Contact 2")]
    Contact2,
    #[serde(rename = "Contact 3")]
    Contact3,
}

impl ContactRole {
    pub fn label(self) -> &'static str {
        match self {
            ContactRole::Owner => "Owner",
            ContactRole::Contact1 => "Contact 1",
            ContactRole::Contact2 => "Contact 2",
            ContactRole::Contact3 => "Contact 3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEntry {
    pub role: ContactRole,
    pub name: String,
    pub mobile_phone: String,
    pub email: String,
    pub whatsapp_no: String,
}

impl ContactEntry {
    /// A contact with every field empty is treated as absent.
    pub fn is_blank(&self) -> bool {
        self.name.is_empty()
            && self.mobile_phone.is_empty()
            && self.email.is_empty()
            && self.whatsapp_no.is_empty()
    }

    fn is_complete(&self) -> bool {
        !self.name.is_empty()
            && !self.mobile_phone.is_empty()
            && !self.email.is_empty()
            && !self.whatsapp_no.is_empty()
    }
}

impl From<ContactForm> for ContactEntry {
    fn from(form: ContactForm) -> Self {
        ContactEntry {
            role: form.role,
            name: form.name,
            mobile_phone: form.mobile_phone,
            email: form.email,
            whatsapp_no: form.whatsapp_no,
        }
    }
}

/// Where credit note claims are routed, with the companion name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimRouting {
    Distributor { name: String },
    MasterDealer { name: String },
}

impl ClaimRouting {
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimRouting::Distributor { .. } => "distributor",
            ClaimRouting::MasterDealer { .. } => "master_dealer",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ClaimRouting::Distributor { name } | ClaimRouting::MasterDealer { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub id: Option<String>,
    pub acp_name: String,
    pub acp_address: String,
    pub city: String,
    pub state: String,
    pub post_code: String,
    pub telephone_no: String,
    pub fax_no: String,
    pub photo_url: Option<String>,
    pub id_card_no: String,
    pub tax_id: String,
    pub sbn_nib: String,
    pub pkp: String,
    pub contacts: Vec<ContactEntry>,
    pub agreement: bool,
    pub claim_routing: ClaimRouting,
    pub created_at: Option<DateTime<Utc>>,
}

impl RegistrationRecord {
    /// Contacts with at least one populated field, in submission order.
    pub fn populated_contacts(&self) -> impl Iterator<Item = &ContactEntry> {
        self.contacts.iter().filter(|c| !c.is_blank())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RsvpRecord {
    pub name: String,
    pub phone: String,
    pub company: String,
    pub attending: bool,
}

// ============================================================================
// VALIDATION
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field wajib harus diisi")]
    MissingRequired,
    #[error("Mohon lengkapi semua field Owner di Contact Information.")]
    IncompleteOwner,
    #[error("Anda harus menyetujui untuk bergabung dengan ASUS Commercial Partner")]
    AgreementRequired,
    #[error("Mohon pilih tempat klaim Credit Note")]
    MissingClaimRouting,
    #[error("Mohon pilih nama Distributor untuk klaim Credit Note")]
    MissingDistributorName,
    #[error("Mohon isi nama Master Dealer untuk klaim Credit Note")]
    MissingMasterDealerName,
    #[error("Data kontak tidak valid")]
    InvalidContacts,
    #[error("Data tidak lengkap")]
    IncompleteRsvp,
    #[error("ID and PDF URL are required")]
    IncompletePdfPatch,
}

impl RegistrationForm {
    /// Full validation applied to new submissions.
    pub fn into_record(self) -> Result<RegistrationRecord, ValidationError> {
        let required = [
            &self.acp_name,
            &self.acp_address,
            &self.city,
            &self.state,
            &self.post_code,
            &self.telephone_no,
        ];
        if required.iter().any(|v| v.is_empty()) {
            return Err(ValidationError::MissingRequired);
        }

        let contacts = check_contacts(self.contacts.clone())?;
        let owner_complete = contacts
            .iter()
            .any(|c| c.role == ContactRole::Owner && c.is_complete());
        if !owner_complete {
            return Err(ValidationError::IncompleteOwner);
        }

        if !self.agreement {
            return Err(ValidationError::AgreementRequired);
        }

        let claim_routing = self.claim_routing()?;
        Ok(self.build(contacts, claim_routing))
    }

    /// Lenient conversion for rendering already-stored registrations.
    pub fn into_printable(self) -> Result<RegistrationRecord, ValidationError> {
        let contacts = check_contacts(self.contacts.clone())?;
        let claim_routing = self.claim_routing()?;
        Ok(self.build(contacts, claim_routing))
    }

    fn claim_routing(&self) -> Result<ClaimRouting, ValidationError> {
        match self.claim_credit_note_to.as_str() {
            "distributor" if self.distributor_name.is_empty() => {
                Err(ValidationError::MissingDistributorName)
            }
            "distributor" => Ok(ClaimRouting::Distributor {
                name: self.distributor_name.clone(),
            }),
            "master_dealer" if self.master_dealer_name.trim().is_empty() => {
                Err(ValidationError::MissingMasterDealerName)
            }
            "master_dealer" => Ok(ClaimRouting::MasterDealer {
                name: self.master_dealer_name.clone(),
            }),
            _ => Err(ValidationError::MissingClaimRouting),
        }
    }

    fn build(self, contacts: Vec<ContactEntry>, claim_routing: ClaimRouting) -> RegistrationRecord {
        RegistrationRecord {
            id: self.id.filter(|id| !id.is_empty()),
            acp_name: self.acp_name,
            acp_address: self.acp_address,
            city: self.city,
            state: self.state,
            post_code: self.post_code,
            telephone_no: self.telephone_no,
            fax_no: self.fax_no,
            photo_url: self.photo_url.filter(|url| !url.is_empty()),
            id_card_no: self.id_card_no,
            tax_id: self.tax_id,
            sbn_nib: self.sbn_nib,
            pkp: self.pkp,
            contacts,
            agreement: self.agreement,
            claim_routing,
            created_at: self.created_at,
        }
    }
}

fn check_contacts(forms: Vec<ContactForm>) -> Result<Vec<ContactEntry>, ValidationError> {
    if forms.len() > MAX_CONTACTS {
        return Err(ValidationError::InvalidContacts);
    }
    let mut seen = Vec::with_capacity(forms.len());
    for form in &forms {
        if seen.contains(&form.role) {
            return Err(ValidationError::InvalidContacts);
        }
        seen.push(form.role);
    }
    Ok(forms.into_iter().map(ContactEntry::from).collect())
}

impl RsvpRequest {
    pub fn into_record(self) -> Result<RsvpRecord, ValidationError> {
        let name = self.name.trim().to_string();
        let phone = self.phone.trim().to_string();
        let company = self.company.trim().to_string();
        match self.attending {
            Some(attending) if !name.is_empty() && !phone.is_empty() && !company.is_empty() => {
                Ok(RsvpRecord {
                    name,
                    phone,
                    company,
                    attending,
                })
            }
            _ => Err(ValidationError::IncompleteRsvp),
        }
    }
}

impl PdfUrlPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() || self.pdf_url.is_empty() {
            return Err(ValidationError::IncompletePdfPatch);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_form() -> RegistrationForm {
        serde_json::from_value(serde_json::json!({
            "id": "test-123",
            "acpName": "PT Test Company",
            "acpAddress": "Jl. Test Address No. 123",
            "city": "Jakarta",
            "state": "DKI Jakarta",
            "postCode": "12345",
            "telephoneNo": "021-12345678",
            "faxNo": "021-87654321",
            "photoUrl": "https://example.com/store-photos/test-photo.jpg",
            "idCardNo": "1234567890123456",
            "taxId": "12.345.678.9-012.000",
            "sbnNib": "SBN123456789",
            "pkp": "PKP123456789",
            "contacts": [
                { "type": "Owner", "name": "John Doe", "mobilePhone": "08123456789",
                  "email": "john.doe@test.com", "whatsappNo": "08123456789" },
                { "type": "Contact 1", "name": "", "mobilePhone": "", "email": "", "whatsappNo": "" },
                { "type": "Contact 2", "name": "", "mobilePhone": "", "email": "", "whatsappNo": "" },
                { "type": "Contact 3", "name": null, "mobilePhone": null, "email": null, "whatsappNo": null }
            ],
            "agreement": true,
            "claimCreditNoteTo": "distributor",
            "distributorName": "PT. SYNNEX METRODATA INDONESIA",
            "masterDealerName": ""
        }))
        .unwrap()
    }

    pub(crate) fn sample_record() -> RegistrationRecord {
        sample_form().into_record().unwrap()
    }

    #[test]
    fn null_fields_become_empty_strings() {
        let form: RegistrationForm = serde_json::from_value(serde_json::json!({
            "acpName": null,
            "faxNo": null
        }))
        .unwrap();
        assert_eq!(form.acp_name, "");
        assert_eq!(form.fax_no, "");
        assert!(form.contacts.is_empty());
    }

    #[test]
    fn valid_form_builds_record_with_distributor_routing() {
        let record = sample_record();
        assert_eq!(
            record.claim_routing,
            ClaimRouting::Distributor {
                name: "PT. SYNNEX METRODATA INDONESIA".into()
            }
        );
        assert_eq!(record.populated_contacts().count(), 1);
        assert_eq!(record.id.as_deref(), Some("test-123"));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let mut form = sample_form();
        form.city.clear();
        assert_eq!(form.into_record().unwrap_err(), ValidationError::MissingRequired);
    }

    #[test]
    fn owner_contact_must_be_complete() {
        let mut form = sample_form();
        form.contacts[0].email.clear();
        assert_eq!(form.into_record().unwrap_err(), ValidationError::IncompleteOwner);
    }

    #[test]
    fn agreement_is_required_for_submission() {
        let mut form = sample_form();
        form.agreement = false;
        assert_eq!(form.into_record().unwrap_err(), ValidationError::AgreementRequired);
    }

    #[test]
    fn master_dealer_name_is_trimmed_before_checking() {
        let mut form = sample_form();
        form.claim_credit_note_to = "master_dealer".into();
        form.master_dealer_name = "   ".into();
        assert_eq!(
            form.into_record().unwrap_err(),
            ValidationError::MissingMasterDealerName
        );
    }

    #[test]
    fn unknown_claim_routing_is_rejected() {
        let mut form = sample_form();
        form.claim_credit_note_to = String::new();
        assert_eq!(
            form.into_record().unwrap_err(),
            ValidationError::MissingClaimRouting
        );
    }

    #[test]
    fn duplicate_contact_roles_are_rejected() {
        let mut form = sample_form();
        form.contacts[1].role = ContactRole::Owner;
        assert_eq!(form.into_record().unwrap_err(), ValidationError::InvalidContacts);
    }

    #[test]
    fn printable_conversion_skips_submission_rules() {
        let mut form = sample_form();
        form.agreement = false;
        form.contacts.clear();
        let record = form.into_printable().unwrap();
        assert!(!record.agreement);
        assert!(record.contacts.is_empty());
    }

    #[test]
    fn rsvp_requires_every_field() {
        let request: RsvpRequest = serde_json::from_value(serde_json::json!({
            "name": "  Budi ", "phone": "0812", "company": "PT Maju", "attending": false
        }))
        .unwrap();
        let record = request.into_record().unwrap();
        assert_eq!(record.name, "Budi");
        assert!(!record.attending);

        let missing: RsvpRequest = serde_json::from_value(serde_json::json!({
            "name": "Budi", "phone": "0812", "company": "PT Maju"
        }))
        .unwrap();
        assert_eq!(missing.into_record().unwrap_err(), ValidationError::IncompleteRsvp);
    }
}
