use crate::util::api_request;

pub async fn run(api_url: &str, query: &str) -> i32 {
    api_request(
        api_url,
        reqwest::Method::GET,
        "/v1/cities/search",
        None,
        None,
        &[("q".to_string(), query.to_string())],
        false,
    )
    .await
}
