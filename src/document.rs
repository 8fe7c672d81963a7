//! Waste-transport document ("bordereau") model
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
            .unwrap_or_else(|| TimeStamp(DateTime::<Utc>::UNIX_EPOCH))
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl fmt::Display for TimeStamp<Utc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Lifecycle stage of a document.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    #[n(0)]
    #[default]
    Initial,
    #[n(1)]
    SignedByProducer,
    #[n(2)]
    SignedByWorker,
    #[n(3)]
    Sent,
    #[n(4)]
    Received,
    #[n(5)]
    Processed,
    #[n(6)]
    Refused,
    #[n(7)]
    AwaitingChild,
    #[n(8)]
    Canceled,
}

impl Status {
    /// Terminal statuses refuse every further field change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Processed | Status::Refused | Status::Canceled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Initial => "INITIAL",
            Status::SignedByProducer => "SIGNED_BY_PRODUCER",
            Status::SignedByWorker => "SIGNED_BY_WORKER",
            Status::Sent => "SENT",
            Status::Received => "RECEIVED",
            Status::Processed => "PROCESSED",
            Status::Refused => "REFUSED",
            Status::AwaitingChild => "AWAITING_CHILD",
            Status::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    #[n(0)]
    Road,
    #[n(1)]
    Rail,
    #[n(2)]
    Air,
    #[n(3)]
    River,
    #[n(4)]
    Sea,
    #[n(5)]
    Other,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportMode::Road => "ROAD",
            TransportMode::Rail => "RAIL",
            TransportMode::Air => "AIR",
            TransportMode::River => "RIVER",
            TransportMode::Sea => "SEA",
            TransportMode::Other => "OTHER",
        };
        f.write_str(s)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptationStatus {
    #[n(0)]
    Accepted,
    #[n(1)]
    Refused,
    #[n(2)]
    PartiallyRefused,
}

impl fmt::Display for AcceptationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AcceptationStatus::Accepted => "ACCEPTED",
            AcceptationStatus::Refused => "REFUSED",
            AcceptationStatus::PartiallyRefused => "PARTIALLY_REFUSED",
        };
        f.write_str(s)
    }
}

/// A signature is present iff both author and date are set.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    #[n(0)]
    pub author: Option<String>,
    #[n(1)]
    pub date: Option<TimeStamp<Utc>>,
}

impl Signature {
    pub fn new(author: &str, date: TimeStamp<Utc>) -> Self {
        Self {
            author: Some(author.to_string()),
            date: Some(date),
        }
    }
    pub fn is_present(&self) -> bool {
        self.author.is_some() && self.date.is_some()
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyRef {
    #[n(0)]
    pub siret: Option<String>,
    #[n(1)]
    pub name: Option<String>,
    #[n(2)]
    pub address: Option<String>,
    #[n(3)]
    pub contact: Option<String>,
    #[n(4)]
    pub phone: Option<String>,
    #[n(5)]
    pub mail: Option<String>,
}

impl CompanyRef {
    pub fn new(siret: &str, name: &str) -> Self {
        Self {
            siret: Some(siret.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
    /// The registry identifier, if one has been filled in.
    pub fn identifier(&self) -> Option<&str> {
        self.siret.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Emitter {
    #[n(0)]
    pub is_private_individual: bool,
    #[n(1)]
    pub company: CompanyRef,
    #[n(2)]
    pub pickup_site_name: Option<String>,
    #[n(3)]
    pub pickup_site_address: Option<String>,
    #[n(4)]
    pub custom_info: Option<String>,
    #[n(5)]
    pub emission: Signature,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Worker {
    #[n(0)]
    pub company: CompanyRef,
    #[n(1)]
    pub certification_number: Option<String>,
    #[n(2)]
    pub certification_organisation: Option<String>,
    #[n(3)]
    pub work: Signature,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Waste {
    #[n(0)]
    pub code: Option<String>,
    #[n(1)]
    pub material_name: Option<String>,
    #[n(2)]
    pub consistence: Option<String>,
    #[n(3)]
    pub seal_numbers: Vec<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Transport {
    #[n(0)]
    pub mode: Option<TransportMode>,
    #[n(1)]
    pub plates: Vec<String>,
    #[n(2)]
    pub taken_over_at: Option<TimeStamp<Utc>>,
    #[n(3)]
    pub signature: Signature,
}

/// One leg of the transporter chain. `number` always mirrors the entry's
/// position in its document's chain (1-based).
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Transporter {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub number: u8,
    #[n(2)]
    pub document_id: Option<String>,
    #[n(3)]
    pub company: CompanyRef,
    #[n(4)]
    pub recepisse: Option<String>,
    #[n(5)]
    pub transport: Transport,
}

impl Transporter {
    pub fn new(id: &str, company: CompanyRef) -> Self {
        Self {
            id: id.to_string(),
            company,
            ..Default::default()
        }
    }
    pub fn is_signed(&self) -> bool {
        self.transport.signature.is_present()
    }
}

/// Weights are stored in kilograms.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Reception {
    #[n(0)]
    pub date: Option<TimeStamp<Utc>>,
    #[n(1)]
    pub weight: Option<f64>,
    #[n(2)]
    pub refused_weight: Option<f64>,
    #[n(3)]
    pub accepted_weight: Option<f64>,
    #[n(4)]
    pub acceptation_status: Option<AcceptationStatus>,
    #[n(5)]
    pub refusal_reason: Option<String>,
    #[n(6)]
    pub signature: Signature,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct NextDestination {
    #[n(0)]
    pub company: CompanyRef,
    #[n(1)]
    pub cap: Option<String>,
    #[n(2)]
    pub planned_operation_code: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Operation {
    #[n(0)]
    pub code: Option<String>,
    #[n(1)]
    pub mode: Option<String>,
    #[n(2)]
    pub date: Option<TimeStamp<Utc>>,
    #[n(3)]
    pub signature: Signature,
    #[n(4)]
    pub next_destination: Option<NextDestination>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Destination {
    #[n(0)]
    pub company: CompanyRef,
    #[n(1)]
    pub cap: Option<String>,
    #[n(2)]
    pub planned_operation_code: Option<String>,
    #[n(3)]
    pub custom_info: Option<String>,
    #[n(4)]
    pub reception: Reception,
    #[n(5)]
    pub operation: Operation,
}

/// The two ways a document can reach its ultimate facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// The destination is the final facility.
    Direct {
        facility: &'a CompanyRef,
        cap: Option<&'a str>,
    },
    /// The destination is an intermediate facility that declared where the
    /// waste goes next.
    ThroughIntermediate {
        intermediate: &'a CompanyRef,
        intermediate_cap: Option<&'a str>,
        facility: &'a CompanyRef,
        cap: Option<&'a str>,
    },
}

impl<'a> Route<'a> {
    pub fn is_direct(&self) -> bool {
        matches!(self, Route::Direct { .. })
    }
    /// The CAP a reader of the document sees as "the CAP": the one of the
    /// final facility, whichever slot holds it.
    pub fn final_cap(&self) -> Option<&'a str> {
        let cap = match self {
            Route::Direct { cap, .. } | Route::ThroughIntermediate { cap, .. } => *cap,
        };
        cap.filter(|c| !c.is_empty())
    }
    pub fn final_facility(&self) -> &'a CompanyRef {
        match self {
            Route::Direct { facility, .. } | Route::ThroughIntermediate { facility, .. } => {
                facility
            }
        }
    }
}

impl Destination {
    /// A next destination only counts once its company is identified.
    pub fn route(&self) -> Route<'_> {
        let next = self
            .operation
            .next_destination
            .as_ref()
            .filter(|next| next.company.identifier().is_some());
        match next {
            Some(next) => Route::ThroughIntermediate {
                intermediate: &self.company,
                intermediate_cap: self.cap.as_deref(),
                facility: &next.company,
                cap: next.cap.as_deref(),
            },
            None => Route::Direct {
                facility: &self.company,
                cap: self.cap.as_deref(),
            },
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct Document {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub status: Status,
    #[n(2)]
    pub emitter: Emitter,
    #[n(3)]
    pub worker: Option<Worker>,
    #[n(4)]
    pub waste: Waste,
    #[n(5)]
    pub destination: Destination,
    #[n(6)]
    pub grouping: Vec<String>,
    #[n(7)]
    pub forwarding: Option<String>,
    #[n(8)]
    pub intermediaries: Vec<CompanyRef>,
    // stored empty: the chain lives in separate transporter records
    #[n(9)]
    pub transporters: Vec<Transporter>,
}

impl Document {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
    /// A worker counts as attached once its company has an identifier.
    pub fn has_worker(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.company.identifier().is_some())
    }
    pub fn route(&self) -> Route<'_> {
        self.destination.route()
    }
    pub fn transport_started(&self) -> bool {
        self.transporters.iter().any(Transporter::is_signed)
    }
    pub fn transporter_ids(&self) -> Vec<String> {
        self.transporters.iter().map(|t| t.id.clone()).collect()
    }
}
