//! Rendering an assembled request as a curl command line.

use crate::request::PreparedRequest;

impl PreparedRequest {
    /// Renders an equivalent `curl` invocation.
    ///
    /// Every argument is single-quoted for POSIX shells. Headers appear sorted
    /// by name so the output is stable.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainreq::Agent;
    ///
    /// let agent = Agent::builder().cookie_store(false).build().unwrap();
    /// let prepared = agent
    ///     .put("http://localhost:8080/pets/1")
    ///     .send(r#"{"name":"it's nemo"}"#)
    ///     .make_request()
    ///     .unwrap();
    ///
    /// assert_eq!(
    ///     prepared.to_curl(),
    ///     r#"curl -X PUT -d '{"name":"it'\''s nemo"}' -H 'content-type: application/json' 'http://localhost:8080/pets/1'"#
    /// );
    /// ```
    pub fn to_curl(&self) -> String {
        let mut parts = vec!["curl".to_string(), "-X".to_string(), self.method.to_string()];

        if let Some(body) = self.body_text() {
            parts.push("-d".to_string());
            parts.push(shell_quote(&body));
        }

        let mut headers: Vec<(&str, String)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        headers.sort_by(|a, b| a.0.cmp(b.0));

        for (name, value) in headers {
            parts.push("-H".to_string());
            parts.push(shell_quote(&format!("{}: {}", name, value)));
        }

        parts.push(shell_quote(self.url.as_str()));
        parts.join(" ")
    }
}

/// Wraps `s` in single quotes, closing and reopening them around embedded ones.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Agent;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME `x`"), "'$HOME `x`'");
    }

    #[test]
    fn test_get_without_body() {
        let agent = Agent::builder().cookie_store(false).build().unwrap();
        let curl = agent
            .get("http://localhost/items?b=1")
            .param("a", "x y")
            .set("X-Trace", "1")
            .set("Accept", "text/plain")
            .as_curl_command()
            .unwrap();

        assert_eq!(
            curl,
            "curl -X GET -H 'accept: text/plain' -H 'x-trace: 1' 'http://localhost/items?b=1&a=x+y'"
        );
    }

    #[test]
    fn test_errors_prevent_rendering() {
        let agent = Agent::builder().cookie_store(false).build().unwrap();
        let errors = agent
            .get("http://localhost/")
            .content_type("bogus")
            .as_curl_command()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
