use marquee_credentials::Provider;

/// Token endpoint for a provider's refresh grant, if the provider is
/// OAuth-backed.
#[must_use]
pub fn token_endpoint(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::GmailOauth => Some("https://oauth2.googleapis.com/token"),
        Provider::OutlookOauth => {
            Some("https://login.microsoftonline.com/common/oauth2/v2.0/token")
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_oauth_providers_have_endpoints() {
        assert!(token_endpoint(Provider::GmailOauth).is_some());
        assert!(token_endpoint(Provider::OutlookOauth).is_some());
        assert!(token_endpoint(Provider::Smtp).is_none());
        assert!(token_endpoint(Provider::Sendgrid).is_none());
    }
}
