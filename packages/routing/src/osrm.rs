//! OSRM route service client.
//!
//! Issues `GET {base_url}/route/v1/{profile}/{lon},{lat};{lon},{lat}` and
//! reads the first route's `distance` (meters) and `duration` (seconds).
//! A single attempt is made per query; the request timeout comes from
//! [`RoutingConfig::timeout_ms`].
//!
//! See <https://project-osrm.org/docs/v5.24.0/api/#route-service>

use std::time::Duration;

use geo::Point;

use crate::{Route, RoutingConfig, RoutingError, RoutingOracle};

/// HTTP client for an OSRM-compatible routing service.
#[derive(Debug, Clone)]
pub struct OsrmClient {
    client: reqwest::Client,
    base_url: String,
    profile: String,
    timeout_ms: u64,
}

impl OsrmClient {
    /// Builds a client with the configured per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &RoutingConfig) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
            timeout_ms: config.timeout_ms,
        })
    }

    /// The request URL for a route between two lon/lat points.
    #[must_use]
    pub fn route_url(&self, from: Point<f64>, to: Point<f64>) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.base_url,
            self.profile,
            from.x(),
            from.y(),
            to.x(),
            to.y()
        )
    }
}

#[async_trait::async_trait]
impl RoutingOracle for OsrmClient {
    async fn route(&self, from: Point<f64>, to: Point<f64>) -> Result<Route, RoutingError> {
        let url = self.route_url(from, to);

        let resp = self
            .client
            .get(&url)
            .query(&[("overview", "false")])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            // OSRM reports NoRoute / InvalidQuery with a 400 and a JSON code.
            if let Some(code) = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|body| body["code"].as_str().map(String::from))
            {
                return Err(RoutingError::NoRoute { code });
            }
            return Err(RoutingError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| RoutingError::Malformed {
                message: format!("invalid JSON: {e}"),
            })?;

        parse_response(&body)
    }
}

impl OsrmClient {
    fn classify(&self, err: reqwest::Error) -> RoutingError {
        if err.is_timeout() {
            RoutingError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else {
            RoutingError::Http(err)
        }
    }
}

/// Parses an OSRM route response body.
fn parse_response(body: &serde_json::Value) -> Result<Route, RoutingError> {
    let code = body["code"].as_str().ok_or_else(|| RoutingError::Malformed {
        message: "OSRM response missing 'code'".to_string(),
    })?;

    if code != "Ok" {
        return Err(RoutingError::NoRoute {
            code: code.to_string(),
        });
    }

    let Some(route) = body["routes"].as_array().and_then(|routes| routes.first()) else {
        return Err(RoutingError::NoRoute {
            code: "NoRoute".to_string(),
        });
    };

    let meters = route["distance"]
        .as_f64()
        .ok_or_else(|| RoutingError::Malformed {
            message: "OSRM route missing 'distance'".to_string(),
        })?;
    let seconds = route["duration"]
        .as_f64()
        .ok_or_else(|| RoutingError::Malformed {
            message: "OSRM route missing 'duration'".to_string(),
        })?;

    if !meters.is_finite() || meters < 0.0 || !seconds.is_finite() || seconds < 0.0 {
        return Err(RoutingError::Malformed {
            message: format!("OSRM route has invalid values: {meters} m, {seconds} s"),
        });
    }

    Ok(Route { meters, seconds })
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves exactly one HTTP response on a random local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}")
    }

    fn client(base_url: String, timeout_ms: u64) -> OsrmClient {
        OsrmClient::new(&RoutingConfig {
            base_url,
            timeout_ms,
            ..RoutingConfig::default()
        })
        .unwrap()
    }

    fn points() -> (Point<f64>, Point<f64>) {
        (Point::new(-66.1057, 18.4655), Point::new(-66.075, 18.45))
    }

    #[test]
    fn builds_osrm_route_url() {
        let osrm = client("http://127.0.0.1:5001/".to_string(), 1_000);
        let (a, b) = points();
        assert_eq!(
            osrm.route_url(a, b),
            "http://127.0.0.1:5001/route/v1/driving/-66.1057,18.4655;-66.075,18.45"
        );
    }

    #[test]
    fn parses_first_route() {
        let body = serde_json::json!({
            "code": "Ok",
            "routes": [
                { "distance": 4210.3, "duration": 391.2 },
                { "distance": 9999.0, "duration": 999.0 }
            ]
        });
        let route = parse_response(&body).unwrap();
        assert!((route.meters - 4210.3).abs() < 1e-9);
        assert!((route.seconds - 391.2).abs() < 1e-9);
    }

    #[test]
    fn non_ok_code_is_no_route() {
        let body = serde_json::json!({ "code": "NoRoute", "routes": [] });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::NoRoute { code }) if code == "NoRoute"
        ));
    }

    #[test]
    fn empty_routes_is_no_route() {
        let body = serde_json::json!({ "code": "Ok", "routes": [] });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::NoRoute { .. })
        ));
    }

    #[test]
    fn missing_fields_are_malformed() {
        let body = serde_json::json!({ "routes": [] });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::Malformed { .. })
        ));

        let body = serde_json::json!({ "code": "Ok", "routes": [{ "distance": 10.0 }] });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::Malformed { .. })
        ));

        let body = serde_json::json!({
            "code": "Ok",
            "routes": [{ "distance": -1.0, "duration": 3.0 }]
        });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn routes_against_live_stub() {
        let base = serve_once(
            "200 OK",
            r#"{"code":"Ok","routes":[{"distance":1500.0,"duration":120.0}]}"#,
        )
        .await;
        let (a, b) = points();

        let route = client(base, 2_000).route(a, b).await.unwrap();
        assert!((route.meters - 1500.0).abs() < f64::EPSILON);
        assert!((route.seconds - 120.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let base = serve_once("200 OK", "<html>not json</html>").await;
        let (a, b) = points();

        let err = client(base, 2_000).route(a, b).await.unwrap_err();
        assert!(matches!(err, RoutingError::Malformed { .. }), "{err}");
    }

    #[tokio::test]
    async fn bad_request_with_code_is_no_route() {
        let base = serve_once("400 Bad Request", r#"{"code":"NoSegment","message":"x"}"#).await;
        let (a, b) = points();

        let err = client(base, 2_000).route(a, b).await.unwrap_err();
        assert!(
            matches!(&err, RoutingError::NoRoute { code } if code == "NoSegment"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn server_error_is_status() {
        let base = serve_once("503 Service Unavailable", "").await;
        let (a, b) = points();

        let err = client(base, 2_000).route(a, b).await.unwrap_err();
        assert!(matches!(err, RoutingError::Status { status: 503 }), "{err}");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (a, b) = points();

        // Accept but never answer; keep the socket open past the timeout.
        let hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let err = client(base, 200).route(a, b).await.unwrap_err();
        assert!(
            matches!(err, RoutingError::Timeout { timeout_ms: 200 }),
            "{err}"
        );
        hold.abort();
    }
}
