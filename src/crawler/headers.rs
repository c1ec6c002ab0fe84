//! Browser-like request headers

use crate::url::Origin;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, DNT, HOST,
    ORIGIN, REFERER, USER_AGENT,
};
use url::Url;

const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

fn digits(rng: &mut impl Rng, count: usize) -> String {
    DIGITS.choose_multiple(rng, count).collect()
}

/// Generates three browser user agents with randomized version numbers
pub fn random_user_agents() -> [String; 3] {
    let mut rng = rand::thread_rng();
    let mut d = |count| digits(&mut rng, count);

    [
        format!(
            "Mozilla/5.0 (iPad; CPU OS 12_2 like Mac OS X) AppleWebKit/{}.{}.{} (KHTML, like Gecko) Mobile/15E148",
            d(3), d(1), d(2)
        ),
        format!(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/10{}.{}.{}.{} Edg/10{}.{}.{}.{} Safari/537.36",
            d(1), d(1), d(1), d(1), d(1), d(1), d(4), d(1)
        ),
        format!(
            "Mozilla/5.0 (Linux; Android 11; SAMSUNG SM-A207F) AppleWebKit/537.36 SamsungBrowser/19.0 (KHTML, like Gecko) Chrome/10{}.{}.{}.{} Safari/{}.{} Edg/10{}.{}.{}.{} Safari/537.36",
            d(1), d(1), d(1), d(1), d(3), d(2), d(1), d(1), d(4), d(1)
        ),
    ]
}

/// Picks one agent from a freshly generated pool
pub fn pick_user_agent() -> String {
    let [a, b, c] = random_user_agents();
    match rand::thread_rng().gen_range(0..3) {
        0 => a,
        1 => b,
        _ => c,
    }
}

/// Builds the headers sent with every crawl request
///
/// `Origin` and `Referer` point at the session origin. `Host` is only pinned
/// for requests to the origin host itself.
pub fn request_headers(origin: Option<&Origin>, target: &Url, user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    insert(&mut headers, ACCEPT, "*/*");
    insert(&mut headers, ACCEPT_ENCODING, "gzip, br");
    insert(&mut headers, ACCEPT_LANGUAGE, "en-US,en;q=0.9,it;q=0.8,es;q=0.7");
    insert(&mut headers, USER_AGENT, user_agent);
    insert(&mut headers, DNT, "1");
    insert(&mut headers, HeaderName::from_static("sec-fetch-dest"), "document");
    insert(&mut headers, HeaderName::from_static("sec-fetch-mode"), "navigate");
    insert(&mut headers, HeaderName::from_static("sec-fetch-site"), "none");
    insert(&mut headers, HeaderName::from_static("sec-fetch-user"), "?1");

    if let Some(origin) = origin {
        insert(&mut headers, ORIGIN, &origin.to_string());
        insert(&mut headers, REFERER, &format!("{}/", origin));

        let same_host = target
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&origin.host));
        if same_host && target.port() == origin.port {
            insert(&mut headers, HOST, &origin.authority());
        }
    }

    headers
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
