use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::model::{PlatformId, ProblemReference};

/// One registry row: a host pattern plus a path pattern whose first capture
/// group is the platform's problem id.
pub struct PlatformRule {
    pub platform: PlatformId,
    host: Regex,
    path: Regex,
    canonical: fn(&str) -> String,
}

impl PlatformRule {
    fn new(
        platform: PlatformId,
        host: &str,
        path: &str,
        canonical: fn(&str) -> String,
    ) -> Self {
        PlatformRule {
            platform,
            host: Regex::new(&format!("(?i)^(?:{})$", host)).unwrap(),
            path: Regex::new(&format!("(?i)^(?:{})/?$", path)).unwrap(),
            canonical,
        }
    }

    fn problem_id(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        if !self.host.is_match(host) {
            return None;
        }
        let caps = self.path.captures(url.path())?;
        caps.get(1).map(|m| m.as_str().to_ascii_lowercase())
    }
}

/// First match wins. Adding a platform means adding a row here and a scraper
/// in `scraper::ScraperFactory`.
static REGISTRY: LazyLock<Vec<PlatformRule>> = LazyLock::new(|| {
    vec![
        PlatformRule::new(
            PlatformId::Boj,
            r"(?:www\.)?acmicpc\.net",
            r"/problem/(\d+)",
            |id| format!("https://www.acmicpc.net/problem/{}", id),
        ),
        PlatformRule::new(
            PlatformId::Boj,
            r"(?:www\.)?boj\.kr",
            r"/(\d+)",
            |id| format!("https://www.acmicpc.net/problem/{}", id),
        ),
        PlatformRule::new(
            PlatformId::LeetCode,
            r"(?:www\.)?leetcode\.(?:com|cn)|(?:www\.)?leetcode-cn\.com",
            r"/problems/([a-z0-9]+(?:-[a-z0-9]+)*)(?:/(?:description|solutions|submissions|editorial)(?:/[^?#]*)?)?",
            |slug| format!("https://leetcode.com/problems/{}/", slug),
        ),
        PlatformRule::new(
            PlatformId::Programmers,
            r"(?:school\.)?programmers\.co\.kr",
            r"/learn/courses/\d+/lessons/(\d+)",
            |id| {
                format!(
                    "https://school.programmers.co.kr/learn/courses/30/lessons/{}",
                    id
                )
            },
        ),
    ]
});

pub fn registry() -> &'static [PlatformRule] {
    &REGISTRY
}

fn parse(url: &str) -> Option<Url> {
    let parsed = Url::parse(url.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" => Some(parsed),
        _ => None,
    }
}

/// Classify a URL. Total: anything unparsable or unregistered is `Unknown`.
pub fn classify(url: &str) -> PlatformId {
    reference(url)
        .map(|r| r.platform)
        .unwrap_or(PlatformId::Unknown)
}

/// Classify a URL and pull out its problem id and canonical URL.
pub fn reference(url: &str) -> Option<ProblemReference> {
    let parsed = parse(url)?;
    registry().iter().find_map(|rule| {
        let id = rule.problem_id(&parsed)?;
        Some(ProblemReference {
            platform: rule.platform,
            canonical_url: (rule.canonical)(&id),
            problem_id: id,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boj_variants() {
        for url in [
            "https://www.acmicpc.net/problem/1000",
            "http://acmicpc.net/problem/1000",
            "https://WWW.ACMICPC.NET/problem/1000/",
            "https://www.acmicpc.net/problem/1000?lang=ko#top",
            "https://boj.kr/1000",
        ] {
            let r = reference(url).unwrap_or_else(|| panic!("no match for {}", url));
            assert_eq!(r.platform, PlatformId::Boj, "{}", url);
            assert_eq!(r.problem_id, "1000");
            assert_eq!(r.canonical_url, "https://www.acmicpc.net/problem/1000");
        }
    }

    #[test]
    fn leetcode_variants() {
        for url in [
            "https://leetcode.com/problems/two-sum/",
            "https://leetcode.com/problems/two-sum",
            "http://www.leetcode.com/problems/Two-Sum/description/",
            "https://leetcode.cn/problems/two-sum/",
            "https://leetcode.com/problems/two-sum/?envType=study-plan",
        ] {
            let r = reference(url).unwrap_or_else(|| panic!("no match for {}", url));
            assert_eq!(r.platform, PlatformId::LeetCode, "{}", url);
            assert_eq!(r.problem_id, "two-sum");
            assert_eq!(r.canonical_url, "https://leetcode.com/problems/two-sum/");
        }
    }

    #[test]
    fn programmers() {
        let r = reference("https://school.programmers.co.kr/learn/courses/30/lessons/42576?language=python3")
            .unwrap();
        assert_eq!(r.platform, PlatformId::Programmers);
        assert_eq!(r.problem_id, "42576");
        assert_eq!(
            r.canonical_url,
            "https://school.programmers.co.kr/learn/courses/30/lessons/42576"
        );
    }

    #[test]
    fn unknown_hosts_and_shapes() {
        for url in [
            "https://codeforces.com/problemset/problem/4/A",
            "https://www.acmicpc.net/status?problem_id=1000",
            "https://www.acmicpc.net/problem/abc",
            "https://leetcode.com/contest/weekly-contest-1",
            "https://evil.com/acmicpc.net/problem/1000",
            "ftp://www.acmicpc.net/problem/1000",
            "not a url",
            "",
        ] {
            assert_eq!(classify(url), PlatformId::Unknown, "{}", url);
        }
    }

    #[test]
    fn slug_never_carries_markup() {
        assert_eq!(
            classify("https://leetcode.com/problems/<script>alert(1)</script>/"),
            PlatformId::Unknown
        );
    }

    proptest! {
        #[test]
        fn classify_is_total(s in ".*") {
            let _ = classify(&s);
        }

        #[test]
        fn any_boj_id_classifies(id in 1u32..100_000) {
            let url = format!("https://www.acmicpc.net/problem/{}", id);
            prop_assert_eq!(classify(&url), PlatformId::Boj);
            prop_assert_eq!(reference(&url).unwrap().problem_id, id.to_string());
        }

        #[test]
        fn any_slug_classifies(slug in "[a-z0-9]{1,8}(-[a-z0-9]{1,8}){0,4}") {
            let url = format!("https://leetcode.com/problems/{}/", slug);
            prop_assert_eq!(classify(&url), PlatformId::LeetCode);
        }

        #[test]
        fn other_hosts_are_unknown(host in "[a-z]{3,10}\\.(org|io|dev)", path in "[a-z0-9/]{0,20}") {
            let url = format!("https://{}/{}", host, path);
            prop_assert_eq!(classify(&url), PlatformId::Unknown);
        }
    }
}
