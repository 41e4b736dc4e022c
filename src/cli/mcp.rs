//! MCP Server for travel planning
//!
//! Exposes two tools over stdio:
//! - get_weather_forecast: AccuWeather forecast + packing suggestions
//! - search_flights: Aviation Stack flight search (mock fallback)
//!
//! Every tool answer is a text block holding a JSON object with a `status`
//! field; MCP protocol errors are only used for malformed requests.

use std::collections::HashSet;
use std::sync::Arc;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars,
    schemars::JsonSchema,
    tool, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::storage::config::{McpConfig, TravelConfig};
use crate::travel::{flights, weather, ToolOutcome};

pub const WEATHER_TOOL: &str = "get_weather_forecast";
pub const FLIGHTS_TOOL: &str = "search_flights";

/// Parameters every tool insists on, advertised as `required` in its schema
const REQUIRED_PARAMS: &[(&str, &[&str])] = &[
    (WEATHER_TOOL, &["destination", "travel_dates"]),
    (FLIGHTS_TOOL, &["origin", "destination", "departure_date"]),
];

const INSTRUCTIONS: &str = r#"# Trellis Travel Tools

Two tools for planning a trip. Both return a JSON object with `status` set to
`success` or `error`; on error, relay `error_message` to the user.

## get_weather_forecast
- `destination`: city name, optionally with country ("Tokyo, Japan")
- `travel_dates`: free text, e.g. "2025-06-15 to 2025-06-20"
Returns a 5-day forecast with temperatures in Celsius and Fahrenheit, a short
conditions summary and packing suggestions.

## search_flights
- `origin`, `destination`: 3-letter IATA codes (JFK, LAX, LHR, CDG, NRT, DXB,
  DEL, BOM, SFO, ORD, FRA, AMS, HND, SIN, SYD)
- `departure_date`: YYYY-MM-DD, today or later
Check `data_source`: when it mentions mock data, tell the user the flights are
illustrative and not bookable.
"#;

fn tool_label(name: &str) -> &'static str {
    match name {
        WEATHER_TOOL => "Weather forecast",
        FLIGHTS_TOOL => "Flight search",
        _ => "Requested",
    }
}

/// Attach the `required` array to each known tool's input schema
fn with_required_params(mut tool: Tool) -> Tool {
    let Some((_, required)) = REQUIRED_PARAMS
        .iter()
        .find(|(name, _)| tool.name == *name)
    else {
        return tool;
    };
    let mut schema = (*tool.input_schema).clone();
    schema.insert("required".to_string(), json!(required));
    tool.input_schema = Arc::new(schema);
    tool
}

/// Travel MCP Server
#[derive(Clone)]
pub struct TravelMcpServer {
    travel: Arc<TravelConfig>,
    disabled: Arc<HashSet<String>>,
    tool_router: ToolRouter<Self>,
}

impl TravelMcpServer {
    pub fn new(travel: TravelConfig, mcp: McpConfig) -> Self {
        let tool_router = Self::tool_router();
        for name in &mcp.disabled_tools {
            if !tool_router.list_all().iter().any(|t| t.name == name.as_str()) {
                tracing::warn!(tool = %name, "disabled_tools names an unknown tool");
            }
        }
        Self {
            travel: Arc::new(travel),
            disabled: Arc::new(mcp.disabled_tools.into_iter().collect()),
            tool_router,
        }
    }

    fn is_known(&self, name: &str) -> bool {
        self.tool_router
            .list_all()
            .iter()
            .any(|t| t.name == name)
    }

    fn is_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }
}

impl ServerHandler for TravelMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_protocol_version(ProtocolVersion::LATEST)
            .with_server_info(
                Implementation::new("trellis-travel", env!("CARGO_PKG_VERSION"))
                    .with_title("Trellis Travel MCP Server"),
            )
            .with_instructions(INSTRUCTIONS)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let name = request.name.to_string();
        tracing::info!(tool = %name, "tool call");

        if self.is_disabled(&name) && self.is_known(&name) {
            return outcome_result(&ToolOutcome::<()>::error(format!(
                "{} tool is not available. Please check server configuration.",
                tool_label(&name)
            )));
        }
        if !self.is_known(&name) {
            return outcome_result(&ToolOutcome::<()>::error(format!(
                "Unknown tool: '{}'. Please check the tool name and request an updated list of available tools.",
                name
            )));
        }

        let tcc = rmcp::handler::server::tool::ToolCallContext::new(self, request, context);
        self.tool_router.call(tcc).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self
            .tool_router
            .list_all()
            .into_iter()
            .filter(|t| !self.is_disabled(&t.name))
            .map(with_required_params)
            .collect();
        Ok(ListToolsResult {
            tools,
            meta: None,
            next_cursor: None,
        })
    }
}

// ============================================================================
// Tool Parameter Types
// ============================================================================

/// Weather forecast parameters
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct WeatherParams {
    /// City name, e.g. "Paris", "Tokyo, Japan", "New York, USA"
    pub destination: Option<String>,
    /// Travel dates, e.g. "2025-06-15 to 2025-06-20"
    pub travel_dates: Option<String>,
}

/// Flight search parameters
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FlightParams {
    /// Origin airport IATA code, e.g. "JFK"
    pub origin: Option<String>,
    /// Destination airport IATA code, e.g. "LAX"
    pub destination: Option<String>,
    /// Departure date in YYYY-MM-DD format
    pub departure_date: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl TravelMcpServer {
    #[tool(
        name = "get_weather_forecast",
        description = "Get the weather forecast for a travel destination with packing suggestions. Returns daily temperatures (Celsius and Fahrenheit), conditions, precipitation chances and what to pack."
    )]
    async fn get_weather_forecast(
        &self,
        params: Parameters<WeatherParams>,
    ) -> Result<CallToolResult, McpError> {
        let WeatherParams {
            destination,
            travel_dates,
        } = params.0;
        let (Some(destination), Some(travel_dates)) = (present(destination), present(travel_dates))
        else {
            return outcome_result(&ToolOutcome::<()>::error(
                "Missing required parameters. Please provide both 'destination' and 'travel_dates'.",
            ));
        };

        let config = Arc::clone(&self.travel);
        run_tool(WEATHER_TOOL, move || {
            weather::get_weather_forecast(&config, &destination, &travel_dates)
        })
        .await
    }

    #[tool(
        name = "search_flights",
        description = "Search flights between two airports by IATA code on a given date (YYYY-MM-DD). Returns airlines, flight numbers, scheduled times and, for generated results, duration, price, aircraft and stops."
    )]
    async fn search_flights(
        &self,
        params: Parameters<FlightParams>,
    ) -> Result<CallToolResult, McpError> {
        let FlightParams {
            origin,
            destination,
            departure_date,
        } = params.0;
        let (Some(origin), Some(destination), Some(departure_date)) =
            (present(origin), present(destination), present(departure_date))
        else {
            return outcome_result(&ToolOutcome::<()>::error(
                "Missing required parameters. Please provide 'origin', 'destination', and 'departure_date'.",
            ));
        };

        let config = Arc::clone(&self.travel);
        run_tool(FLIGHTS_TOOL, move || {
            flights::search_flights(&config, &origin, &destination, &departure_date)
        })
        .await
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn outcome_result<T: Serialize>(outcome: &ToolOutcome<T>) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(outcome)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Run a blocking tool on the blocking pool; a panic becomes an error outcome
async fn run_tool<T>(
    name: &'static str,
    f: impl FnOnce() -> ToolOutcome<T> + Send + 'static,
) -> Result<CallToolResult, McpError>
where
    T: Serialize + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(outcome) => outcome_result(&outcome),
        Err(e) => {
            let (detail, error_type) = if e.is_panic() {
                let payload = e.into_panic();
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "tool panicked".to_string());
                (detail, "Panic")
            } else {
                (e.to_string(), "Cancelled")
            };
            tracing::error!(tool = name, error = %detail, "tool worker failed");
            outcome_result(&ToolOutcome::<T>::Error {
                error_message: format!(
                    "Error executing {} tool: {}",
                    tool_label(name).to_lowercase(),
                    detail
                ),
                error_type: Some(error_type.to_string()),
            })
        }
    }
}

// ============================================================================
// Server Entry Point
// ============================================================================

/// Run the MCP server with stdio transport
pub async fn run_mcp_server(
    travel: TravelConfig,
    mcp: McpConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use rmcp::transport::io::stdio;

    let server = TravelMcpServer::new(travel, mcp);
    let transport = stdio();

    tracing::info!("travel MCP server listening on stdio");
    let service = server.serve(transport).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::travel::test_support;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    // ---- McpTestClient: MCP protocol test harness ----

    struct McpTestClient {
        writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
        reader: BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
        server_task: tokio::task::JoinHandle<Result<(), String>>,
    }

    impl McpTestClient {
        async fn start(server: TravelMcpServer) -> Self {
            let (client_stream, server_stream) = tokio::io::duplex(64 * 1024);
            let (server_read, server_write) = tokio::io::split(server_stream);

            let server_task = tokio::spawn(async move {
                let service = server
                    .serve((server_read, server_write))
                    .await
                    .map_err(|e| e.to_string())?;
                service.waiting().await.map_err(|e| e.to_string())?;
                Ok::<(), String>(())
            });

            let (client_read, writer) = tokio::io::split(client_stream);
            let reader = BufReader::new(client_read);

            let mut client = Self {
                writer,
                reader,
                server_task,
            };
            client.handshake().await;
            client
        }

        async fn send(&mut self, v: serde_json::Value) {
            let mut s = serde_json::to_string(&v).unwrap();
            s.push('\n');
            self.writer.write_all(s.as_bytes()).await.unwrap();
            self.writer.flush().await.unwrap();
        }

        async fn recv_for_id(&mut self, id: i64) -> serde_json::Value {
            loop {
                let mut line = String::new();
                let n = self.reader.read_line(&mut line).await.unwrap();
                assert!(n > 0, "server closed connection");
                let v: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
                if v.get("id").and_then(|x| x.as_i64()) == Some(id) {
                    return v;
                }
            }
        }

        async fn handshake(&mut self) {
            self.send(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": {},
                    "clientInfo": {"name": "trellis-test", "version": "0"}
                }
            }))
            .await;
            let init_resp = self.recv_for_id(1).await;
            assert_eq!(
                init_resp["result"]["serverInfo"]["name"].as_str(),
                Some("trellis-travel")
            );

            self.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .await;
        }

        async fn list_tools(&mut self, id: i64) -> Vec<serde_json::Value> {
            self.send(json!({"jsonrpc": "2.0", "id": id, "method": "tools/list", "params": {}}))
                .await;
            let resp = self.recv_for_id(id).await;
            resp["result"]["tools"].as_array().cloned().unwrap_or_default()
        }

        /// Call a tool and parse the JSON text it returned
        async fn call_tool(
            &mut self,
            id: i64,
            name: &str,
            args: serde_json::Value,
        ) -> serde_json::Value {
            self.send(json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "tools/call",
                "params": {"name": name, "arguments": args}
            }))
            .await;
            let resp = self.recv_for_id(id).await;
            let text = resp["result"]["content"][0]["text"]
                .as_str()
                .unwrap_or_else(|| panic!("no text content in {}", resp));
            serde_json::from_str(text).unwrap()
        }

        async fn shutdown(self) {
            let Self {
                mut writer,
                reader,
                server_task,
            } = self;
            writer.shutdown().await.unwrap();
            drop(writer);
            drop(reader);
            tokio::time::timeout(std::time::Duration::from_secs(3), server_task)
                .await
                .expect("server did not exit")
                .expect("server task join failed")
                .expect("server returned error");
        }
    }

    fn server_without_keys() -> TravelMcpServer {
        TravelMcpServer::new(TravelConfig::default(), McpConfig::default())
    }

    fn tool_names(tools: &[serde_json::Value]) -> Vec<&str> {
        tools.iter().filter_map(|t| t["name"].as_str()).collect()
    }

    #[tokio::test]
    async fn list_tools_advertises_required_params() {
        let mut client = McpTestClient::start(server_without_keys()).await;
        let tools = client.list_tools(2).await;

        let mut names = tool_names(&tools);
        names.sort();
        assert_eq!(names, vec!["get_weather_forecast", "search_flights"]);

        for tool in &tools {
            let required: Vec<&str> = tool["inputSchema"]["required"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|v| v.as_str())
                .collect();
            match tool["name"].as_str() {
                Some("get_weather_forecast") => {
                    assert_eq!(required, vec!["destination", "travel_dates"])
                }
                Some("search_flights") => {
                    assert_eq!(required, vec!["origin", "destination", "departure_date"])
                }
                other => panic!("unexpected tool {:?}", other),
            }
            assert!(tool["inputSchema"]["properties"].is_object());
        }
        client.shutdown().await;
    }

    #[tokio::test]
    async fn disabled_tool_is_hidden_and_refused() {
        let server = TravelMcpServer::new(
            TravelConfig::default(),
            McpConfig {
                disabled_tools: vec!["search_flights".to_string()],
            },
        );
        let mut client = McpTestClient::start(server).await;

        let tools = client.list_tools(2).await;
        assert_eq!(tool_names(&tools), vec!["get_weather_forecast"]);

        let v = client
            .call_tool(
                3,
                "search_flights",
                json!({"origin": "JFK", "destination": "LAX", "departure_date": "2030-01-01"}),
            )
            .await;
        assert_eq!(v["status"], "error");
        assert_eq!(
            v["error_message"],
            "Flight search tool is not available. Please check server configuration."
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn missing_params_are_reported() {
        let mut client = McpTestClient::start(server_without_keys()).await;

        let v = client
            .call_tool(2, "get_weather_forecast", json!({"destination": "Paris"}))
            .await;
        assert_eq!(
            v["error_message"],
            "Missing required parameters. Please provide both 'destination' and 'travel_dates'."
        );

        let v = client
            .call_tool(
                3,
                "search_flights",
                json!({"origin": "JFK", "destination": "", "departure_date": "2030-01-01"}),
            )
            .await;
        assert_eq!(v["status"], "error");
        assert_eq!(
            v["error_message"],
            "Missing required parameters. Please provide 'origin', 'destination', and 'departure_date'."
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_content() {
        let mut client = McpTestClient::start(server_without_keys()).await;
        let v = client.call_tool(2, "book_hotel", json!({})).await;
        assert_eq!(v["status"], "error");
        assert_eq!(
            v["error_message"],
            "Unknown tool: 'book_hotel'. Please check the tool name and request an updated list of available tools."
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn tool_errors_pass_through() {
        let mut client = McpTestClient::start(server_without_keys()).await;

        let v = client
            .call_tool(
                2,
                "get_weather_forecast",
                json!({"destination": "Paris", "travel_dates": "2030-06-01 to 2030-06-05"}),
            )
            .await;
        assert_eq!(
            v["error_message"],
            "ACCUWEATHER_API_KEY not found in environment variables. Please check your .env file."
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn flight_validation_through_server() {
        let travel = TravelConfig {
            aviationstack_api_key: Some("k".to_string()),
            aviationstack_base_url: test_support::dead_url(),
            ..TravelConfig::default()
        };
        let mut client = McpTestClient::start(TravelMcpServer::new(travel, McpConfig::default())).await;

        let v = client
            .call_tool(
                2,
                "search_flights",
                json!({"origin": "XYZ", "destination": "LAX", "departure_date": "2030-01-01"}),
            )
            .await;
        assert_eq!(v["status"], "error");
        assert_eq!(
            v["error_message"],
            "Airport code 'XYZ' not found in database. Please use common airport codes like JFK, LAX, LHR, CDG, NRT, DEL, BOM, etc."
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn weather_success_through_server() {
        let stub = test_support::serve(vec![
            (
                200,
                r#"[{"Key": "1", "LocalizedName": "Tokyo", "Country": {"LocalizedName": "Japan"}}]"#
                    .to_string(),
            ),
            (
                200,
                r#"{"DailyForecasts": [{"Date": "2030-06-01T07:00:00+09:00",
                    "Temperature": {"Minimum": {"Value": 20.0}, "Maximum": {"Value": 31.0}},
                    "Day": {"IconPhrase": "Hot"}, "Night": {"IconPhrase": "Clear"}}]}"#
                    .to_string(),
            ),
        ]);
        let travel = TravelConfig {
            accuweather_api_key: Some("k".to_string()),
            accuweather_base_url: stub.base_url.clone(),
            ..TravelConfig::default()
        };
        let mut client = McpTestClient::start(TravelMcpServer::new(travel, McpConfig::default())).await;

        let v = client
            .call_tool(
                2,
                "get_weather_forecast",
                json!({"destination": "Tokyo", "travel_dates": "2030-06-01"}),
            )
            .await;
        assert_eq!(v["status"], "success");
        assert_eq!(v["destination"], "Tokyo");
        assert_eq!(v["country"], "Japan");
        assert_eq!(v["temperature_summary"]["overall_max_fahrenheit"], 88);
        assert_eq!(v["packing_suggestions"][0], "Light, breathable clothing");
        assert_eq!(v["data_source"], "AccuWeather API");

        client.shutdown().await;
        stub.join();
    }

    #[tokio::test]
    async fn panicking_tool_becomes_error_outcome() {
        let result = run_tool(WEATHER_TOOL, || -> ToolOutcome<()> { panic!("boom") })
            .await
            .unwrap();
        let text = serde_json::to_value(&result).unwrap();
        let inner: serde_json::Value =
            serde_json::from_str(text["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(inner["status"], "error");
        assert_eq!(
            inner["error_message"],
            "Error executing weather forecast tool: boom"
        );
        assert_eq!(inner["error_type"], "Panic");
    }
}
