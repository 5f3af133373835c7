//! Integration tests for geocoding providers.
//!
//! The HTTP path is exercised against a throwaway local server that replays a
//! canned backend response. Tests against the real backends run only when API
//! keys are available.

use geocode_core::{
    GeocodeRequest, GeocodingProvider, PrecisionLevel, ProviderErrorKind, ReverseGeocodeRequest,
};
use geocode_providers::{AmapProvider, BaiduProvider, GoogleProvider, ProviderConfig};
use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve `body` with `status` to every connection; returns the base URL and
/// the captured request lines.
async fn canned_server(status: &'static str, body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let captured = Arc::clone(&captured);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
                        break;
                    }
                }
                let head = String::from_utf8_lossy(&buf[..read]).to_string();
                if let Some(line) = head.lines().next() {
                    captured.lock().unwrap().push(line.to_string());
                }
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), seen)
}

fn has_key(var: &str) -> bool {
    env::var(var).is_ok()
}

#[cfg(test)]
mod amap_tests {
    use super::*;

    #[tokio::test]
    async fn test_geocode_over_http() {
        let (base, seen) = canned_server(
            "200 OK",
            r#"{"status":"1","info":"OK","infocode":"10000","geocodes":[{"formatted_address":"北京市朝阳区",
                "location":"116.443205,39.921506","level":"区县","city":"北京市"}]}"#,
        )
        .await;
        let provider = AmapProvider::new(ProviderConfig::new("amap", "k-123", base)).unwrap();
        let request = GeocodeRequest::new("朝阳区", Some("北京")).unwrap();

        let result = provider.geocode(&request).await.unwrap();
        assert_eq!(result.provider_name(), "amap");
        assert_eq!(result.precision_level(), PrecisionLevel::Approximate);

        let lines = seen.lock().unwrap().clone();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("GET /geocode/geo?"));
        assert!(lines[0].contains("key=k-123"));
        assert!(lines[0].contains("city="));
    }

    #[tokio::test]
    async fn test_reverse_radius_clamped_on_wire() {
        let (base, seen) = canned_server(
            "200 OK",
            r#"{"status":"1","regeocode":{"formatted_address":"somewhere","addressComponent":{}}}"#,
        )
        .await;
        let provider = AmapProvider::new(ProviderConfig::new("amap", "k", base)).unwrap();
        let request = ReverseGeocodeRequest::with_radius(39.9042, 116.4074, 20_000).unwrap();

        provider.reverse_geocode(&request).await.unwrap();

        let line = seen.lock().unwrap()[0].clone();
        assert!(line.starts_with("GET /geocode/regeo?"));
        assert!(line.contains("radius=3000"));
        assert!(line.contains("location=116.407400%2C39.904200"));
    }

    #[tokio::test]
    async fn test_invalid_key_over_http() {
        let (base, _) = canned_server(
            "200 OK",
            r#"{"status":"0","info":"INVALID_USER_KEY","infocode":"10001"}"#,
        )
        .await;
        let provider = AmapProvider::new(ProviderConfig::new("amap", "bad", base)).unwrap();
        let request = GeocodeRequest::new("x", None).unwrap();

        let err = provider.geocode(&request).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidCredential);
    }

    #[tokio::test]
    #[ignore = "Requires AMAP_API_KEY environment variable"]
    async fn test_amap_live_geocode() {
        if !has_key("AMAP_API_KEY") {
            eprintln!("Skipping test: AMAP_API_KEY not set");
            return;
        }
        let key = env::var("AMAP_API_KEY").unwrap();
        let provider = AmapProvider::new(AmapProvider::default_config("amap", key)).unwrap();
        let request = GeocodeRequest::new("北京市朝阳区阜通东大街6号", None).unwrap();

        let result = provider.geocode(&request).await;
        assert!(result.is_ok(), "Request failed: {:?}", result.err());
    }
}

#[cfg(test)]
mod baidu_tests {
    use super::*;

    #[tokio::test]
    async fn test_geocode_over_http() {
        let (base, seen) = canned_server(
            "200 OK",
            r#"{"status":0,"result":{"location":{"lng":121.47,"lat":31.23},"precise":0,"confidence":50,"level":"城市"}}"#,
        )
        .await;
        let provider = BaiduProvider::new(ProviderConfig::new("baidu", "ak-1", base)).unwrap();
        let request = GeocodeRequest::new("上海", None).unwrap();

        let result = provider.geocode(&request).await.unwrap();
        assert_eq!(result.latitude(), 31.23);
        assert_eq!(result.precision_level(), PrecisionLevel::Approximate);

        let line = seen.lock().unwrap()[0].clone();
        assert!(line.starts_with("GET /geocoding/v3/?"));
        assert!(line.contains("ak=ak-1"));
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let (base, _) = canned_server("503 Service Unavailable", "{}").await;
        let provider = BaiduProvider::new(ProviderConfig::new("baidu", "ak", base)).unwrap();
        let request = ReverseGeocodeRequest::new(31.23, 121.47).unwrap();

        let err = provider.reverse_geocode(&request).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Unreachable);
        assert_eq!(err.provider, "baidu");
    }

    #[tokio::test]
    #[ignore = "Requires BAIDU_API_KEY environment variable"]
    async fn test_baidu_live_reverse() {
        if !has_key("BAIDU_API_KEY") {
            eprintln!("Skipping test: BAIDU_API_KEY not set");
            return;
        }
        let key = env::var("BAIDU_API_KEY").unwrap();
        let provider = BaiduProvider::new(BaiduProvider::default_config("baidu", key)).unwrap();
        let request = ReverseGeocodeRequest::new(39.9042, 116.4074).unwrap();

        let result = provider.reverse_geocode(&request).await;
        assert!(result.is_ok(), "Request failed: {:?}", result.err());
    }
}

#[cfg(test)]
mod google_tests {
    use super::*;

    #[tokio::test]
    async fn test_region_hint_appended() {
        let (base, seen) = canned_server("200 OK", r#"{"status":"ZERO_RESULTS","results":[]}"#).await;
        let provider = GoogleProvider::new(ProviderConfig::new("google", "g", base)).unwrap();
        let request = GeocodeRequest::new("Main St", Some("Springfield")).unwrap();

        let err = provider.geocode(&request).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NotFound);

        let line = seen.lock().unwrap()[0].clone();
        assert!(line.starts_with("GET /geocode/json?"));
        assert!(line.contains("Springfield"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_malformed() {
        let (base, _) = canned_server("200 OK", "<html>oops</html>").await;
        let provider = GoogleProvider::new(ProviderConfig::new("google", "g", base)).unwrap();
        let request = GeocodeRequest::new("x", None).unwrap();

        let err = provider.geocode(&request).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_rate_limited_status_is_quota() {
        let (base, _) = canned_server("429 Too Many Requests", "{}").await;
        let provider = GoogleProvider::new(ProviderConfig::new("google", "g", base)).unwrap();
        let request = GeocodeRequest::new("x", None).unwrap();

        let err = provider.geocode(&request).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::QuotaExceeded);
    }

    #[tokio::test]
    #[ignore = "Requires GOOGLE_API_KEY environment variable"]
    async fn test_google_live_geocode() {
        if !has_key("GOOGLE_API_KEY") {
            eprintln!("Skipping test: GOOGLE_API_KEY not set");
            return;
        }
        let key = env::var("GOOGLE_API_KEY").unwrap();
        let provider = GoogleProvider::new(GoogleProvider::default_config("google", key)).unwrap();
        let request = GeocodeRequest::new("1600 Amphitheatre Parkway, Mountain View", None).unwrap();

        let result = provider.geocode(&request).await;
        assert!(result.is_ok(), "Request failed: {:?}", result.err());
    }
}

#[cfg(test)]
mod transport_tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ProviderConfig::new("amap", "k", format!("http://{addr}"))
            .with_timeout(Duration::from_secs(2));
        let provider = AmapProvider::new(config).unwrap();
        let request = GeocodeRequest::new("x", None).unwrap();

        let err = provider.geocode(&request).await.unwrap_err();
        assert!(
            matches!(err.kind, ProviderErrorKind::Unreachable | ProviderErrorKind::Timeout),
            "unexpected kind: {:?}",
            err.kind
        );
    }
}

#[cfg(test)]
mod provider_registry_tests {
    use super::*;
    use geocode_providers::ProviderRegistry;

    #[test]
    fn test_registry_with_real_clients() {
        let registry = ProviderRegistry::new();
        let amap = AmapProvider::new(AmapProvider::default_config("amap", "k")).unwrap();
        let google = GoogleProvider::new(GoogleProvider::default_config("google", "k")).unwrap();

        registry.register(Arc::new(amap), true).unwrap();
        registry.register(Arc::new(google), true).unwrap();
        registry.set_default("google").unwrap();

        let chain = registry.fallback_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].name(), "google");
        assert_eq!(chain[1].name(), "amap");
    }
}
