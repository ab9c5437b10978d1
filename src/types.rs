//! Identifiers, timestamps and day quantities shared by every record
use bech32::Bech32m;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid7::uuid7;

/// Leave quantities are counted in (possibly fractional) days.
pub type Days = Decimal;

pub type EmployeeId = String;
pub type LeaveTypeId = String;
pub type RequestId = String;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
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

/// Construct a unique, time ordered identifier and encode it using bech32 under `hrp`.
pub fn new_id(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct DateRange {
    #[n(0)]
    #[cbor(with = "cbor_date")]
    pub from: NaiveDate,
    #[n(1)]
    #[cbor(with = "cbor_date")]
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }
    pub fn is_sane(&self) -> bool {
        self.from <= self.to
    }
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.from <= other.to && other.from <= self.to
    }
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }
}

// minicbor `with` codecs for field types that don't implement the minicbor traits.

pub mod cbor_date {
    use chrono::NaiveDate;
    use minicbor::{Decoder, Encoder, decode::{self}, encode::{self}};

    pub fn encode<C, W: encode::Write>(
        v: &NaiveDate,
        e: &mut Encoder<W>,
        _: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        use chrono::Datelike;
        e.i32(v.num_days_from_ce())?.ok()
    }

    pub fn decode<'b, C>(d: &mut Decoder<'b>, _: &mut C) -> Result<NaiveDate, decode::Error> {
        let days = d.i32()?;
        NaiveDate::from_num_days_from_ce_opt(days)
            .ok_or(decode::Error::message("date out of range"))
    }
}

pub mod cbor_opt_date {
    use chrono::NaiveDate;
    use minicbor::{Decoder, Encoder, data::Type, decode::{self}, encode::{self}};

    pub fn encode<C, W: encode::Write>(
        v: &Option<NaiveDate>,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        match v {
            Some(date) => super::cbor_date::encode(date, e, ctx),
            None => e.null()?.ok(),
        }
    }

    pub fn decode<'b, C>(
        d: &mut Decoder<'b>,
        ctx: &mut C,
    ) -> Result<Option<NaiveDate>, decode::Error> {
        if d.datatype()? == Type::Null {
            d.null()?;
            return Ok(None);
        }
        super::cbor_date::decode(d, ctx).map(Some)
    }
}

pub mod cbor_days {
    use minicbor::{Decoder, Encoder, decode::{self}, encode::{self}};
    use rust_decimal::Decimal;

    pub fn encode<C, W: encode::Write>(
        v: &Decimal,
        e: &mut Encoder<W>,
        _: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.bytes(&v.serialize())?.ok()
    }

    pub fn decode<'b, C>(d: &mut Decoder<'b>, _: &mut C) -> Result<Decimal, decode::Error> {
        let raw: [u8; 16] = d
            .bytes()?
            .try_into()
            .map_err(|_| decode::Error::message("decimal must be 16 bytes"))?;
        Ok(Decimal::deserialize(raw))
    }
}

pub mod cbor_opt_days {
    use minicbor::{Decoder, Encoder, data::Type, decode::{self}, encode::{self}};
    use rust_decimal::Decimal;

    pub fn encode<C, W: encode::Write>(
        v: &Option<Decimal>,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        match v {
            Some(days) => super::cbor_days::encode(days, e, ctx),
            None => e.null()?.ok(),
        }
    }

    pub fn decode<'b, C>(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Option<Decimal>, decode::Error> {
        if d.datatype()? == Type::Null {
            d.null()?;
            return Ok(None);
        }
        super::cbor_days::decode(d, ctx).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn timestamp_calendar_date() {
        let late = TimeStamp::new_with(2025, 6, 2, 23, 59, 59).unwrap();
        assert_eq!(late.date(), NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert!(TimeStamp::new_with(2025, 2, 30, 0, 0, 0).is_none());
    }

    #[derive(Debug, PartialEq, minicbor::Encode, minicbor::Decode)]
    struct Probe {
        #[n(0)]
        #[cbor(with = "cbor_days")]
        amount: Days,
        #[n(1)]
        #[cbor(with = "cbor_opt_date")]
        watermark: Option<NaiveDate>,
        #[n(2)]
        #[cbor(with = "cbor_opt_days")]
        cap: Option<Days>,
    }

    #[test]
    fn codecs_keep_scale_and_nulls() {
        let probe = Probe {
            amount: dec!(1.75),
            watermark: None,
            cap: Some(dec!(5)),
        };
        let bytes = minicbor::to_vec(&probe).unwrap();
        let back: Probe = minicbor::decode(&bytes).unwrap();
        assert_eq!(probe, back);
        assert_eq!(back.amount.to_string(), "1.75");
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = new_id("leave_").unwrap();
        let b = new_id("leave_").unwrap();
        assert!(a.starts_with("leave_1"));
        assert_ne!(a, b);
        assert!(new_id("").is_err());
    }

    #[test]
    fn range_overlap_is_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        let a = DateRange::new(d(3), d(7));
        assert!(a.overlaps(&DateRange::new(d(7), d(9))));
        assert!(!a.overlaps(&DateRange::new(d(8), d(9))));
        assert_eq!(a.days().count(), 5);
        assert!(!DateRange::new(d(9), d(8)).is_sane());
    }
}
