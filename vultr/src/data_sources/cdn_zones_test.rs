#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::provider_data::test_provider_data;
    use mockito::{Server, ServerGuard};
    use std::any::Any;
    use std::sync::Arc;
    use tfplug::filter::FILTER_BLOCK;
    use tfplug::types::{AttributePath, DynamicValue};

    async fn configure<D: DataSourceWithConfigure>(server: &ServerGuard, data_source: &mut D) {
        let data: Arc<dyn Any + Send + Sync> = Arc::new(test_provider_data(&server.url()));
        let response = data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
    }

    async fn mock_pull_zones(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/v2/cdns/pull-zones")
            .with_body(
                serde_json::json!({
                    "pull_zones": [
                        {"id": "z1", "label": "site", "origin_domain": "example.com",
                         "cdn_url": "z1.vultrcdn.com", "status": "active"},
                        {"id": "z2", "label": "blog", "origin_domain": "blog.example.com",
                         "cdn_url": "z2.vultrcdn.com", "status": "active"},
                        {"id": "z3", "label": "site", "origin_domain": "mirror.example.com",
                         "cdn_url": "z3.vultrcdn.com", "status": "pending"}
                    ],
                    "meta": {"total": 3, "links": {"next": "", "prev": ""}}
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    fn filter_config(name: &str, values: &[&str]) -> DynamicValue {
        let filter = StateBuilder::new()
            .string("name", name)
            .strings("values", values.iter().copied())
            .build_object();
        StateBuilder::new()
            .list(FILTER_BLOCK, vec![filter])
            .build()
    }

    fn ids(state: &DynamicValue, list: &str) -> Vec<String> {
        state
            .get_list(&AttributePath::new(list))
            .unwrap()
            .into_iter()
            .map(|zone| {
                DynamicValue::new(zone)
                    .get_string(&AttributePath::new("id"))
                    .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_list_without_filter_returns_every_zone() {
        let mut server = Server::new_async().await;
        let _zones = mock_pull_zones(&mut server).await;

        let mut data_source = CdnZonesDataSource::pull();
        configure(&server, &mut data_source).await;
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vultr_cdn_pull_zones".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response.state.get_string(&AttributePath::new("id")).unwrap(),
            "cdn_pull_zones"
        );
        assert_eq!(ids(&response.state, "cdn_pull_zones"), vec!["z1", "z2", "z3"]);
    }

    #[tokio::test]
    async fn test_list_applies_filter_on_json_names() {
        let mut server = Server::new_async().await;
        let _zones = mock_pull_zones(&mut server).await;

        let mut data_source = CdnZonesDataSource::pull();
        configure(&server, &mut data_source).await;
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vultr_cdn_pull_zones".to_string(),
                    config: filter_config("label", &["site"]),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(ids(&response.state, "cdn_pull_zones"), vec!["z1", "z3"]);
    }

    #[tokio::test]
    async fn test_single_zone_matches_exactly_one() {
        let mut server = Server::new_async().await;
        let _zones = mock_pull_zones(&mut server).await;

        let mut data_source = CdnZoneDataSource::pull();
        configure(&server, &mut data_source).await;
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vultr_cdn_pull_zone".to_string(),
                    config: filter_config("cdn_url", &["z2.vultrcdn.com"]),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "z2");
        assert_eq!(
            state.get_string(&AttributePath::new("origin_domain")).unwrap(),
            "blog.example.com"
        );
        assert!(state.is_set(&AttributePath::new(FILTER_BLOCK)));
    }

    #[tokio::test]
    async fn test_single_zone_reports_ambiguous_and_empty_results() {
        let mut server = Server::new_async().await;
        let _zones = mock_pull_zones(&mut server).await;

        let mut data_source = CdnZoneDataSource::pull();
        configure(&server, &mut data_source).await;

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vultr_cdn_pull_zone".to_string(),
                    config: filter_config("label", &["site"]),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].detail, crate::data_sources::TOO_MANY_RESULTS);

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vultr_cdn_pull_zone".to_string(),
                    config: filter_config("label", &["nothing"]),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].detail, crate::data_sources::NO_RESULTS);
    }

    #[tokio::test]
    async fn test_single_zone_requires_filter() {
        let data_source = CdnZoneDataSource::push();
        let response = data_source
            .validate(
                Context::new(),
                ValidateDataSourceConfigRequest {
                    type_name: "vultr_cdn_push_zone".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Missing filter");
    }

    #[tokio::test]
    async fn test_push_zone_schema_has_no_origin() {
        let schema = CdnZonesDataSource::push()
            .schema(Context::new(), DataSourceSchemaRequest)
            .await
            .schema;
        assert!(schema.attribute("cdn_push_zones").unwrap().computed);

        let single = CdnZoneDataSource::push()
            .schema(Context::new(), DataSourceSchemaRequest)
            .await
            .schema;
        assert!(single.attribute("origin_domain").is_none());
        assert!(single.attribute("cdn_domain").unwrap().computed);
    }

    #[tokio::test]
    async fn test_list_api_error_surfaces() {
        let mut server = Server::new_async().await;
        let _zones = server
            .mock("GET", "/v2/cdns/push-zones")
            .with_status(403)
            .with_body(r#"{"error":"Unauthorized IP address","status":403}"#)
            .create_async()
            .await;

        let mut data_source = CdnZonesDataSource::push();
        configure(&server, &mut data_source).await;
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vultr_cdn_push_zones".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to read CDN push zones");
        assert!(response.diagnostics[0].detail.contains("Unauthorized IP address"));
    }
}
