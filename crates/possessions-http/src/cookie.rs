//! Session cookie options and `Set-Cookie` encoding

use http::HeaderMap;
use http::header::{COOKIE, HeaderValue};
use possessions_core::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// `SameSite` cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

impl fmt::Display for SameSite {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Strict => "Strict",
			Self::Lax => "Lax",
			Self::None => "None",
		})
	}
}

/// Attributes of the session cookie
///
/// # Examples
///
/// ```
/// use possessions_http::{CookieOptions, SameSite};
/// use std::time::Duration;
///
/// let options = CookieOptions::new("sid")
///     .with_max_age(Duration::from_secs(3600))
///     .with_same_site(SameSite::Lax);
/// assert_eq!(options.name(), "sid");
/// assert!(options.secure());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
	name: String,
	max_age: Option<Duration>,
	secure: bool,
	http_only: bool,
	path: String,
	domain: Option<String>,
	same_site: Option<SameSite>,
}

impl Default for CookieOptions {
	fn default() -> Self {
		Self::new("id")
	}
}

impl CookieOptions {
	/// Options for a cookie called `name`, secure and HTTP-only, scoped to `/`
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			max_age: None,
			secure: true,
			http_only: true,
			path: "/".to_string(),
			domain: None,
			same_site: None,
		}
	}

	/// Cookie lifetime; without one the cookie lasts for the browser session
	///
	/// A zero lifetime also means a browser-session cookie, since `Max-Age=0`
	/// would delete the cookie on arrival.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = (!max_age.is_zero()).then_some(max_age);
		self
	}

	pub fn with_secure(mut self, secure: bool) -> Self {
		self.secure = secure;
		self
	}

	pub fn with_http_only(mut self, http_only: bool) -> Self {
		self.http_only = http_only;
		self
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();
		self
	}

	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());
		self
	}

	pub fn with_same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = Some(same_site);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn max_age(&self) -> Option<Duration> {
		self.max_age
	}

	pub fn secure(&self) -> bool {
		self.secure
	}

	pub fn http_only(&self) -> bool {
		self.http_only
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn domain(&self) -> Option<&str> {
		self.domain.as_deref()
	}

	pub fn same_site(&self) -> Option<SameSite> {
		self.same_site
	}

	/// Check that the options can produce a valid cookie
	pub fn validate(&self) -> Result<()> {
		if self.name.is_empty() {
			return Err(SessionError::Configuration(
				"cookie name must be provided".to_string(),
			));
		}
		if !self.name.bytes().all(is_token_byte) {
			return Err(SessionError::Configuration(format!(
				"invalid cookie name: {:?}",
				self.name
			)));
		}
		for (attribute, value) in [("path", Some(self.path.as_str())), ("domain", self.domain())] {
			if let Some(value) = value
				&& !value.bytes().all(is_attribute_byte)
			{
				return Err(SessionError::Configuration(format!(
					"invalid cookie {attribute}: {value:?}"
				)));
			}
		}
		Ok(())
	}

	/// Value of this cookie in the request's `Cookie` headers
	pub fn cookie_value(&self, headers: &HeaderMap) -> Option<String> {
		headers
			.get_all(COOKIE)
			.iter()
			.filter_map(|header| header.to_str().ok())
			.flat_map(|header| header.split(';'))
			.find_map(|pair| {
				let (name, value) = pair.trim().split_once('=')?;
				(name == self.name).then(|| value.trim_matches('"').to_string())
			})
	}

	/// `Set-Cookie` value carrying the session id
	pub fn make_cookie(&self, session_id: &str) -> Result<HeaderValue> {
		let mut parts = vec![format!("{}={}", self.name, session_id)];
		self.push_attributes(&mut parts);

		if let Some(max_age) = self.max_age {
			parts.push(format!("Max-Age={}", max_age.as_secs()));
			let expires = SystemTime::now()
				.checked_add(max_age)
				.unwrap_or_else(SystemTime::now);
			parts.push(format!("Expires={}", httpdate::fmt_http_date(expires)));
		}

		header_value(parts)
	}

	/// `Set-Cookie` value that removes the session cookie from the client
	pub fn deletion_cookie(&self) -> Result<HeaderValue> {
		let mut parts = vec![format!("{}=", self.name)];
		self.push_attributes(&mut parts);
		parts.push("Max-Age=0".to_string());
		parts.push(format!("Expires={}", httpdate::fmt_http_date(UNIX_EPOCH)));

		header_value(parts)
	}

	fn push_attributes(&self, parts: &mut Vec<String>) {
		parts.push(format!("Path={}", self.path));

		if let Some(domain) = &self.domain {
			parts.push(format!("Domain={}", domain));
		}

		if self.http_only {
			parts.push("HttpOnly".to_string());
		}

		if self.secure {
			parts.push("Secure".to_string());
		}

		if let Some(same_site) = self.same_site {
			parts.push(format!("SameSite={}", same_site));
		}
	}
}

fn header_value(parts: Vec<String>) -> Result<HeaderValue> {
	HeaderValue::try_from(parts.join("; ")).map_err(|e| SessionError::Configuration(e.to_string()))
}

// RFC 6265 cookie-name token characters
fn is_token_byte(b: u8) -> bool {
	b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
}

fn is_attribute_byte(b: u8) -> bool {
	b.is_ascii_graphic() && b != b';'
}
