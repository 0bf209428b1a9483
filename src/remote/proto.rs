//! Protobuf encoding for the remote-read protocol.
//!
//! Manual prost::Message implementations matching the `prompb` package
//! (remote.proto and types.proto), without proto codegen.

use prost::{DecodeError, Message};

// ============================================================================
// Label
// ============================================================================

/// Wire-format Label matching prompb.Label.
#[derive(Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Label {
    pub name: String,  // field 1
    pub value: String, // field 2
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Message for Label {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if !self.name.is_empty() {
            prost::encoding::string::encode(1, &self.name, buf);
        }
        if !self.value.is_empty() {
            prost::encoding::string::encode(2, &self.value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::string::merge(wire_type, &mut self.name, buf, ctx),
            2 => prost::encoding::string::merge(wire_type, &mut self.value, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if !self.name.is_empty() {
            len += prost::encoding::string::encoded_len(1, &self.name);
        }
        if !self.value.is_empty() {
            len += prost::encoding::string::encoded_len(2, &self.value);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Sample
// ============================================================================

/// Wire-format Sample matching prompb.Sample.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Sample {
    pub value: f64,     // field 1
    pub timestamp: i64, // field 2
}

impl Message for Sample {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.value != 0.0 || self.value.is_sign_negative() {
            prost::encoding::double::encode(1, &self.value, buf);
        }
        if self.timestamp != 0 {
            prost::encoding::int64::encode(2, &self.timestamp, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::double::merge(wire_type, &mut self.value, buf, ctx),
            2 => prost::encoding::int64::merge(wire_type, &mut self.timestamp, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if self.value != 0.0 || self.value.is_sign_negative() {
            len += prost::encoding::double::encoded_len(1, &self.value);
        }
        if self.timestamp != 0 {
            len += prost::encoding::int64::encoded_len(2, &self.timestamp);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// TimeSeries
// ============================================================================

/// Wire-format TimeSeries matching prompb.TimeSeries.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct TimeSeries {
    pub labels: Vec<Label>,   // field 1
    pub samples: Vec<Sample>, // field 2
}

impl Message for TimeSeries {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        for label in &self.labels {
            prost::encoding::message::encode(1, label, buf);
        }
        for sample in &self.samples {
            prost::encoding::message::encode(2, sample, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let mut label = Label::default();
                prost::encoding::message::merge(wire_type, &mut label, buf, ctx)?;
                self.labels.push(label);
                Ok(())
            }
            2 => {
                let mut sample = Sample::default();
                prost::encoding::message::merge(wire_type, &mut sample, buf, ctx)?;
                self.samples.push(sample);
                Ok(())
            }
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        for label in &self.labels {
            len += prost::encoding::message::encoded_len(1, label);
        }
        for sample in &self.samples {
            len += prost::encoding::message::encoded_len(2, sample);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// LabelMatcher
// ============================================================================

/// Matcher operator codes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum MatcherType {
    Eq = 0,
    Neq = 1,
    Re = 2,
    Nre = 3,
}

impl MatcherType {
    /// Decode a wire value; unknown values yield `None`.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Eq),
            1 => Some(Self::Neq),
            2 => Some(Self::Re),
            3 => Some(Self::Nre),
            _ => None,
        }
    }
}

/// Wire-format LabelMatcher matching prompb.LabelMatcher.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct LabelMatcher {
    pub r#type: i32,   // field 1
    pub name: String,  // field 2
    pub value: String, // field 3
}

impl Message for LabelMatcher {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.r#type != 0 {
            prost::encoding::int32::encode(1, &self.r#type, buf);
        }
        if !self.name.is_empty() {
            prost::encoding::string::encode(2, &self.name, buf);
        }
        if !self.value.is_empty() {
            prost::encoding::string::encode(3, &self.value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::int32::merge(wire_type, &mut self.r#type, buf, ctx),
            2 => prost::encoding::string::merge(wire_type, &mut self.name, buf, ctx),
            3 => prost::encoding::string::merge(wire_type, &mut self.value, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if self.r#type != 0 {
            len += prost::encoding::int32::encoded_len(1, &self.r#type);
        }
        if !self.name.is_empty() {
            len += prost::encoding::string::encoded_len(2, &self.name);
        }
        if !self.value.is_empty() {
            len += prost::encoding::string::encoded_len(3, &self.value);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// ReadHints
// ============================================================================

/// Wire-format ReadHints matching prompb.ReadHints.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct ReadHints {
    pub step_ms: i64,  // field 1
    pub func: String,  // field 2
    pub start_ms: i64, // field 3
    pub end_ms: i64,   // field 4
}

impl Message for ReadHints {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.step_ms != 0 {
            prost::encoding::int64::encode(1, &self.step_ms, buf);
        }
        if !self.func.is_empty() {
            prost::encoding::string::encode(2, &self.func, buf);
        }
        if self.start_ms != 0 {
            prost::encoding::int64::encode(3, &self.start_ms, buf);
        }
        if self.end_ms != 0 {
            prost::encoding::int64::encode(4, &self.end_ms, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::int64::merge(wire_type, &mut self.step_ms, buf, ctx),
            2 => prost::encoding::string::merge(wire_type, &mut self.func, buf, ctx),
            3 => prost::encoding::int64::merge(wire_type, &mut self.start_ms, buf, ctx),
            4 => prost::encoding::int64::merge(wire_type, &mut self.end_ms, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if self.step_ms != 0 {
            len += prost::encoding::int64::encoded_len(1, &self.step_ms);
        }
        if !self.func.is_empty() {
            len += prost::encoding::string::encoded_len(2, &self.func);
        }
        if self.start_ms != 0 {
            len += prost::encoding::int64::encoded_len(3, &self.start_ms);
        }
        if self.end_ms != 0 {
            len += prost::encoding::int64::encoded_len(4, &self.end_ms);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Query
// ============================================================================

/// Wire-format Query matching prompb.Query.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Query {
    pub start_timestamp_ms: i64,     // field 1
    pub end_timestamp_ms: i64,       // field 2
    pub matchers: Vec<LabelMatcher>, // field 3
    pub hints: Option<ReadHints>,    // field 4
}

impl Message for Query {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.start_timestamp_ms != 0 {
            prost::encoding::int64::encode(1, &self.start_timestamp_ms, buf);
        }
        if self.end_timestamp_ms != 0 {
            prost::encoding::int64::encode(2, &self.end_timestamp_ms, buf);
        }
        for matcher in &self.matchers {
            prost::encoding::message::encode(3, matcher, buf);
        }
        if let Some(ref hints) = self.hints {
            prost::encoding::message::encode(4, hints, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::int64::merge(wire_type, &mut self.start_timestamp_ms, buf, ctx),
            2 => prost::encoding::int64::merge(wire_type, &mut self.end_timestamp_ms, buf, ctx),
            3 => {
                let mut matcher = LabelMatcher::default();
                prost::encoding::message::merge(wire_type, &mut matcher, buf, ctx)?;
                self.matchers.push(matcher);
                Ok(())
            }
            4 => {
                let mut hints = self.hints.take().unwrap_or_default();
                prost::encoding::message::merge(wire_type, &mut hints, buf, ctx)?;
                self.hints = Some(hints);
                Ok(())
            }
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if self.start_timestamp_ms != 0 {
            len += prost::encoding::int64::encoded_len(1, &self.start_timestamp_ms);
        }
        if self.end_timestamp_ms != 0 {
            len += prost::encoding::int64::encoded_len(2, &self.end_timestamp_ms);
        }
        for matcher in &self.matchers {
            len += prost::encoding::message::encoded_len(3, matcher);
        }
        if let Some(ref hints) = self.hints {
            len += prost::encoding::message::encoded_len(4, hints);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// QueryResult
// ============================================================================

/// Wire-format QueryResult matching prompb.QueryResult.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct QueryResult {
    pub timeseries: Vec<TimeSeries>, // field 1
}

impl Message for QueryResult {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        for series in &self.timeseries {
            prost::encoding::message::encode(1, series, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let mut series = TimeSeries::default();
                prost::encoding::message::merge(wire_type, &mut series, buf, ctx)?;
                self.timeseries.push(series);
                Ok(())
            }
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        self.timeseries
            .iter()
            .map(|series| prost::encoding::message::encoded_len(1, series))
            .sum()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// ReadRequest / ReadResponse
// ============================================================================

/// Wire-format ReadRequest matching prompb.ReadRequest.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    pub queries: Vec<Query>, // field 1
}

impl Message for ReadRequest {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        for query in &self.queries {
            prost::encoding::message::encode(1, query, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let mut query = Query::default();
                prost::encoding::message::merge(wire_type, &mut query, buf, ctx)?;
                self.queries.push(query);
                Ok(())
            }
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        self.queries
            .iter()
            .map(|query| prost::encoding::message::encoded_len(1, query))
            .sum()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Wire-format ReadResponse matching prompb.ReadResponse.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct ReadResponse {
    pub results: Vec<QueryResult>, // field 1
}

impl Message for ReadResponse {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        for result in &self.results {
            prost::encoding::message::encode(1, result, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let mut result = QueryResult::default();
                prost::encoding::message::merge(wire_type, &mut result, buf, ctx)?;
                self.results.push(result);
                Ok(())
            }
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        self.results
            .iter()
            .map(|result| prost::encoding::message::encoded_len(1, result))
            .sum()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}
