//! Pluggable authentication, per spec.md §4.3. MongoDB Atlas's API requires
//! HTTP Digest Authentication; the sink uses none (it authenticates via a
//! collector token embedded in its endpoint URL instead).

#[derive(Debug, Clone)]
pub enum Auth {
    None,
    Digest { username: String, password: String },
}

/// Computes the `Authorization` header value for a digest challenge received
/// from a 401 response, mirroring `requests.auth.HTTPDigestAuth`'s
/// challenge/response loop in the system this client replaces.
pub fn digest_answer(
    username: &str,
    password: &str,
    uri: &str,
    www_authenticate: &str,
) -> Result<String, digest_auth::Error> {
    let mut prompt = digest_auth::parse(www_authenticate)?;
    let context = digest_auth::AuthContext::new(username, password, uri);
    let answer = prompt.respond(&context)?;
    Ok(answer.to_header_string())
}
