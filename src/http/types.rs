//! Core HTTP protocol types

use std::fmt;

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:literal, $str:literal);
    )+) => {
        /// HTTP status code.
        ///
        /// Any `u16` can be used as a status; only the codes listed as
        /// constants have a reason phrase; every other code is written with
        /// an empty one (`HTTP/1.1 418 \r\n`).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct StatusCode(pub u16);

        impl StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            pub const $name: StatusCode = StatusCode($num);
        )+

            /// Reason phrase for the status line, empty for unknown codes.
            #[inline]
            pub const fn reason(&self) -> &'static str {
                match self.0 { $(
                    $num => $str,
                )+
                    _ => "",
                }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    OK = (200, "OK");
    /// [[RFC9110, Section 15.3.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.2)]
    CREATED = (201, "Created");
    /// [[RFC9110, Section 15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)]
    BAD_REQUEST = (400, "BadRequest");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NOT_FOUND = (404, "Not Found");
}

impl StatusCode {
    #[inline(always)]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::OK
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

/// First line of a response: `<version> <code> <reason>\r\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLine<'a> {
    pub version: &'a str,
    pub code: StatusCode,
}

impl<'a> StatusLine<'a> {
    #[inline]
    pub const fn new(version: &'a str, code: StatusCode) -> Self {
        Self { version, code }
    }

    #[inline]
    pub(crate) fn write_to(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.version.as_bytes());
        buffer.push(b' ');
        buffer.extend_from_slice(self.code.0.to_string().as_bytes());
        buffer.push(b' ');
        buffer.extend_from_slice(self.code.reason().as_bytes());
        buffer.extend_from_slice(b"\r\n");
    }
}

impl fmt::Display for StatusLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}\r\n", self.version, self.code)
    }
}

// HEADERS

/// Header map with exact, case-sensitive names.
///
/// Keeps insertion order. Inserting an existing name replaces its value in
/// place (last write wins), so a name is never stored twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under exactly `name`.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Stores `value` under `name`, returning the replaced value if any.
    pub fn insert<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> Option<String> {
        let name = name.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}
