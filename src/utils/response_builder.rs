use actix_web::{cookie::Cookie, HttpResponse};

pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Create a redirect response with optional cookies
    #[must_use]
    pub fn redirect(location: &str, cookies: Option<Vec<Cookie<'static>>>) -> HttpResponse {
        let mut builder = HttpResponse::Found();

        if let Some(cookies_vec) = cookies {
            for cookie in cookies_vec {
                builder.cookie(cookie);
            }
        }

        builder.append_header(("Location", location)).finish()
    }

    /// Create an error redirect response carrying an `error` query parameter
    #[must_use]
    pub fn error_redirect(location: &str, error_param: &str) -> HttpResponse {
        let redirect_url = if location.contains('?') {
            format!("{location}&error={}", urlencoding::encode(error_param))
        } else {
            format!("{location}?error={}", urlencoding::encode(error_param))
        };

        Self::redirect(&redirect_url, None)
    }

    /// Create a success redirect response with multiple cookies
    #[must_use]
    pub fn success_redirect_with_cookies(location: &str, cookies: Vec<Cookie<'static>>) -> HttpResponse {
        Self::redirect(location, Some(cookies))
    }

    #[must_use]
    pub fn unauthorized_json(message: &str) -> HttpResponse {
        HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "unauthorized",
            "message": message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::{header, StatusCode};

    fn location(response: &HttpResponse) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    #[test]
    fn test_error_redirect_appends_parameter() {
        let response = ResponseBuilder::error_redirect("/login", "unsupported_provider");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/login?error=unsupported_provider");

        let response = ResponseBuilder::error_redirect("/login?lang=en", "auth failed");
        assert_eq!(location(&response), "/login?lang=en&error=auth%20failed");
    }

    #[test]
    fn test_redirect_sets_cookies() {
        let response = ResponseBuilder::success_redirect_with_cookies(
            "/dashboard",
            vec![Cookie::new("a", "1"), Cookie::new("b", "2")],
        );
        assert_eq!(location(&response), "/dashboard");
        assert_eq!(response.cookies().count(), 2);
    }
}
