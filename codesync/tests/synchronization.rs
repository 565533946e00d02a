use async_trait::async_trait;
use codesync::builders::{BuildContext, BuildOptions, BuildRequest};
use codesync::error::InputKind;
use codesync::prelude::*;
use codesync::{CodesyncError, Document, Result};
use pretty_assertions::assert_eq;

const SOURCE: &str = "Acme.Data";
const TARGET: &str = "Acme.App";

fn ty(text: &str) -> TypeRef {
    TypeRef::parse(text).unwrap()
}

struct Fixture {
    host: MemoryHost,
    line: Document,
}

async fn fixture() -> Fixture {
    let host = MemoryHost::new();
    let entities = Location::folder(SOURCE, "Entities");

    host.add_type(
        entities.clone(),
        TypeDefinition::new(SOURCE, "OrderStatus", TypeKind::Enum),
    )
    .await;
    host.add_type(
        entities.clone(),
        TypeDefinition::class(SOURCE, "DbCustomerEntity")
            .with_member(Member::property("Id", ty("Guid")))
            .with_member(Member::property("Name", ty("string")))
            .with_member(Member::property("Orders", ty("List<DbOrderEntity>"))),
    )
    .await;
    host.add_type(
        entities.clone(),
        TypeDefinition::class(SOURCE, "DbOrderEntity")
            .with_member(Member::property("Id", ty("Guid")))
            .with_member(Member::property("Lines", ty("List<DbLineEntity>")))
            .with_member(Member::property("Total", ty("decimal?")))
            .with_member(Member::property("Status", ty("OrderStatus")))
            .with_member(Member::property("ShippedOn", ty("DateTime?"))),
    )
    .await;
    let line = host
        .add_type(
            entities.clone(),
            TypeDefinition::class(SOURCE, "DbLineEntity")
                .with_member(Member::property("Id", ty("Guid")))
                .with_member(Member::property("Sku", ty("string")))
                .with_member(Member::property("Quantity", ty("int")))
                .with_member(Member::property("Order", ty("DbOrderEntity?"))),
        )
        .await;
    host.add_type(
        Location::folder(SOURCE, "Logic"),
        TypeDefinition::interface(SOURCE, "IOrderLogic")
            .with_member(Member::method(
                "GetOrderAsync",
                ty("Task<DbOrderEntity>"),
                vec![Parameter::new("id", ty("Guid"))],
            ))
            .with_member(Member::method(
                "CancelAsync",
                ty("Task"),
                vec![Parameter::new("id", ty("Guid"))],
            )),
    )
    .await;

    Fixture { host, line }
}

fn settings() -> SyncSettings {
    SyncSettings::new(Location::project(SOURCE), TARGET, TARGET)
}

fn property_type(definition: &TypeDefinition, name: &str) -> String {
    definition
        .find_member(name)
        .and_then(Member::value_type)
        .map(|type_ref| type_ref.to_string())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_model_created_with_nested_dependency() {
    let Fixture { host, .. } = fixture().await;
    let mut session = session(&host, settings());

    let outcome = session
        .synchronize("DbOrderEntity", ArtifactKind::Model)
        .await
        .unwrap();

    assert_eq!(outcome.status, SyncStatus::Created);
    assert_eq!(outcome.artifact, "OrderModel");
    assert_eq!(outcome.dependencies, vec!["LineModel"]);
    assert_eq!(outcome.added.len(), 5);
    assert_eq!(property_type(&outcome.definition, "Total"), "decimal");
    assert_eq!(property_type(&outcome.definition, "ShippedOn"), "DateTime");
    assert_eq!(
        property_type(&outcome.definition, "Lines"),
        "List<Acme.App.Models.LineModel>"
    );
    assert_eq!(
        property_type(&outcome.definition, "Status"),
        "Acme.Data.OrderStatus"
    );

    let text = host.text(&outcome.document).await.unwrap();
    assert!(text.contains("namespace Acme.App.Models;"));
    assert!(text.contains("using Acme.Data;"));
    assert!(text.contains("public List<LineModel> Lines { get; set; }"));

    assert_eq!(host.documents_named("LineModel").await.len(), 1);
}

#[tokio::test]
async fn test_second_session_makes_no_writes() {
    let Fixture { host, .. } = fixture().await;
    session(&host, settings())
        .synchronize("DbOrderEntity", ArtifactKind::Model)
        .await
        .unwrap();
    let writes = host.writes().await;

    let mut again = session(&host, settings());
    let outcome = again
        .synchronize("DbOrderEntity", ArtifactKind::Model)
        .await
        .unwrap();

    assert!(outcome.is_unchanged());
    assert!(outcome.added.is_empty() && outcome.disabled.is_empty());
    assert_eq!(host.writes().await, writes);
    assert!(!again.report().has_changes());
    assert_eq!(again.report().summary(), "No changes detected");
}

#[tokio::test]
async fn test_repeat_in_session_touches_nothing() {
    let Fixture { host, .. } = fixture().await;
    let mut session = session(&host, settings());
    let first = session
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();
    let (reads, writes) = (host.reads().await, host.writes().await);

    let repeat = session
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();

    assert_eq!(repeat.status, SyncStatus::Unchanged);
    assert_eq!(repeat.document, first.document);
    assert_eq!(host.reads().await, reads);
    assert_eq!(host.writes().await, writes);
}

#[tokio::test]
async fn test_closure_creates_each_artifact_once() {
    let Fixture { host, .. } = fixture().await;
    let mut session = session(&host, settings());

    session
        .synchronize("DbCustomerEntity", ArtifactKind::Model)
        .await
        .unwrap();

    for name in ["CustomerModel", "OrderModel", "LineModel"] {
        assert_eq!(host.documents_named(name).await.len(), 1, "{name}");
    }
    // Five source documents plus three models.
    assert_eq!(host.document_count().await, 8);

    let created: Vec<&str> = session
        .report()
        .artifacts
        .iter()
        .map(|outcome| outcome.artifact.as_str())
        .collect();
    assert_eq!(created, vec!["LineModel", "OrderModel", "CustomerModel"]);
}

#[tokio::test]
async fn test_changed_member_is_disabled_then_replaced() {
    let Fixture { host, line } = fixture().await;
    session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();

    let mut source = host.definition(&line).await.unwrap();
    for member in &mut source.members {
        if member.name == "Quantity" {
            *member = Member::property("Quantity", ty("long"));
        }
    }
    host.update_type(&line, source).await;

    let outcome = session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();
    assert_eq!(outcome.status, SyncStatus::Updated);
    assert_eq!(outcome.added, vec!["Quantity"]);
    assert_eq!(outcome.disabled, vec!["Quantity"]);
    assert_eq!(property_type(&outcome.definition, "Quantity"), "long");
    assert_eq!(outcome.definition.disabled_members.len(), 1);

    let text = host.text(&outcome.document).await.unwrap();
    assert!(text.contains("// public int Quantity { get; set; }"));

    let settled = session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();
    assert!(settled.is_unchanged());
    assert_eq!(settled.definition.disabled_members.len(), 1);
}

#[tokio::test]
async fn test_orphans_pruned_but_hand_written_members_kept() {
    let Fixture { host, line } = fixture().await;
    let first = session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();

    let mut model = host.definition(&first.document).await.unwrap();
    model
        .members
        .push(Member::property("DisplayName", ty("string")).read_only());
    host.update_type(&first.document, model).await;

    let mut source = host.definition(&line).await.unwrap();
    source.members.retain(|member| member.name != "Sku");
    host.update_type(&line, source).await;

    let outcome = session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();
    assert_eq!(outcome.disabled, vec!["Sku"]);
    assert!(outcome.added.is_empty());
    assert!(outcome.definition.find_member("DisplayName").is_some());
    assert!(outcome.definition.find_member("Sku").is_none());
}

#[tokio::test]
async fn test_batch_runs_dependencies_first() {
    let Fixture { host, .. } = fixture().await;
    let mut session = session(&host, settings());

    let outcomes = session
        .synchronize_all(["DbCustomerEntity", "DbOrderEntity"], ArtifactKind::Model)
        .await
        .unwrap();

    let sources: Vec<&str> = outcomes.iter().map(|o| o.source.as_str()).collect();
    assert_eq!(sources, vec!["DbOrderEntity", "DbCustomerEntity"]);
    assert!(outcomes.iter().all(|o| o.status == SyncStatus::Created));
    assert!(outcomes[1].dependencies.is_empty());
    assert_eq!(host.documents_named("OrderModel").await.len(), 1);
}

#[tokio::test]
async fn test_batch_reports_reference_cycles() {
    let Fixture { host, .. } = fixture().await;
    let mut session = session(&host, settings());
    session
        .synchronize_all(["DbOrderEntity", "DbLineEntity", "DbCustomerEntity"], ArtifactKind::Model)
        .await
        .unwrap();

    assert_eq!(
        session.report().cycles,
        vec![vec!["DbLineEntity".to_string(), "DbOrderEntity".to_string()]]
    );
    assert!(
        session
            .report()
            .summary()
            .ends_with("Reference cycles: DbLineEntity <-> DbOrderEntity")
    );
}

#[tokio::test]
async fn test_service_delegates_to_logic() {
    let Fixture { host, .. } = fixture().await;
    let mut session = session(&host, settings());

    let outcome = session
        .synchronize("IOrderLogic", ArtifactKind::Service)
        .await
        .unwrap();

    assert_eq!(outcome.artifact, "OrderService");
    assert_eq!(outcome.added, vec!["GetOrder", "Cancel"]);
    assert_eq!(outcome.dependencies, vec!["OrderModel"]);

    let text = host.text(&outcome.document).await.unwrap();
    assert!(text.contains("Task<OrderModel> GetOrder(Guid id)"));
    assert!(text.contains("_logic.GetOrderAsync(id)"));
    assert!(text.contains("_logic.CancelAsync(id)"));
    assert!(text.contains("private readonly IOrderLogic _logic;"));
    assert!(text.contains("public OrderService(IOrderLogic logic)"));
    assert!(text.contains("catch (Exception)\n"));
    assert!(!text.contains("catch (Exception ex)"));
    assert_eq!(host.documents_named("OrderModel").await.len(), 1);
}

#[tokio::test]
async fn test_contract_is_an_interface() {
    let Fixture { host, .. } = fixture().await;
    let outcome = session(&host, settings())
        .synchronize("IOrderLogic", ArtifactKind::Contract)
        .await
        .unwrap();

    assert_eq!(outcome.artifact, "IOrderContract");
    assert!(outcome.definition.is_interface());
    let text = host.text(&outcome.document).await.unwrap();
    assert!(text.contains("Task<OrderModel> GetOrderAsync(Guid id);"));
}

#[tokio::test]
async fn test_missing_source_type() {
    let Fixture { host, .. } = fixture().await;
    let error = session(&host, settings())
        .synchronize("DbInvoiceEntity", ArtifactKind::Model)
        .await
        .unwrap_err();

    match error {
        CodesyncError::MissingInput(missing) => {
            assert_eq!(missing.kind, InputKind::SourceType);
            assert_eq!(missing.name, "DbInvoiceEntity");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(host.writes().await, 0);
}

#[tokio::test]
async fn test_missing_source_project_and_folder() {
    let Fixture { host, .. } = fixture().await;
    let mut wrong_project = settings();
    wrong_project.source = Location::project("Acme.Legacy");
    let error = session(&host, wrong_project)
        .synchronize("DbOrderEntity", ArtifactKind::Model)
        .await
        .unwrap_err();
    match error {
        CodesyncError::MissingInput(missing) => {
            assert_eq!(missing.kind, InputKind::Project);
            assert_eq!(missing.name, "Acme.Legacy");
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut wrong_folder = settings();
    wrong_folder.source = Location::folder(SOURCE, "Archive");
    let error = session(&host, wrong_folder)
        .synchronize("DbOrderEntity", ArtifactKind::Model)
        .await
        .unwrap_err();
    match error {
        CodesyncError::MissingInput(missing) => {
            assert_eq!(missing.kind, InputKind::Folder);
            assert_eq!(missing.name, "Acme.Data/Archive");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(host.writes().await, 0);
}

#[tokio::test]
async fn test_unloadable_target() {
    let Fixture { host, .. } = fixture().await;
    session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();
    host.make_unloadable("LineModel").await;

    let error = session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap_err();
    match error {
        CodesyncError::StructuralLoad(load) => assert_eq!(load.artifact, "LineModel"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_settings_from_config() {
    let config = CodesyncConfig::from_toml_str(
        r#"
        [general]
        source_project = "Acme.Data"
        target_project = "Acme.Web"
        root_namespace = "Acme.Web"

        [artifacts.model]
        folder = "Dto"
        namespace = "Acme.Web.Dto"
        add_suffix = "Dto"
        "#,
    )
    .unwrap();
    let settings = SyncSettings::from_config(&config).unwrap();

    let Fixture { host, .. } = fixture().await;
    let outcome = session(&host, settings)
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();
    assert_eq!(outcome.artifact, "LineDto");
    assert_eq!(outcome.document.path, "Acme.Web/Dto/LineDto.cs");
    assert_eq!(outcome.definition.namespace, "Acme.Web.Dto");
}

/// Suppresses one property by name.
struct Suppress(&'static str);

#[async_trait]
impl MemberBuilder for Suppress {
    fn handles(&self, member: &Member) -> bool {
        member.name == self.0
    }

    async fn build(
        &self,
        _request: &BuildRequest<'_>,
        _ctx: &BuildContext<'_>,
        _indent_level: usize,
        _options: &BuildOptions,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_custom_builder_runs_first() {
    let Fixture { host, .. } = fixture().await;
    let mut suppressing = session(&host, settings());
    suppressing.builders_mut().register_first(Box::new(Suppress("Sku")));

    let outcome = suppressing
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();
    assert!(!outcome.added.contains(&"Sku".to_string()));
    assert!(outcome.definition.find_member("Sku").is_none());

    let outcome = session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();
    assert_eq!(outcome.added, vec!["Sku"]);
}

fn full_closure() -> SyncSettings {
    let mut settings = settings();
    settings.set_closure_mode(ClosureMode::Full);
    settings
}

#[tokio::test]
async fn test_full_closure_refreshes_existing_dependencies() {
    let Fixture { host, line } = fixture().await;
    let outcome = session(&host, full_closure())
        .synchronize("DbOrderEntity", ArtifactKind::Model)
        .await
        .unwrap();
    assert_eq!(outcome.status, SyncStatus::Created);
    assert_eq!(outcome.dependencies, vec!["LineModel"]);
    assert_eq!(host.document_count().await, 7);

    let mut entity = host.definition(&line).await.unwrap();
    entity.members.push(Member::property("Discount", ty("decimal?")));
    host.update_type(&line, entity).await;

    let mut session = session(&host, full_closure());
    let outcome = session
        .synchronize("DbOrderEntity", ArtifactKind::Model)
        .await
        .unwrap();
    assert!(outcome.is_unchanged());
    assert_eq!(outcome.dependencies, vec!["LineModel"]);

    let line_model = session
        .report()
        .artifacts
        .iter()
        .find(|o| o.artifact == "LineModel")
        .unwrap();
    assert_eq!(line_model.status, SyncStatus::Updated);
    assert_eq!(line_model.added, vec!["Discount"]);
    let names: Vec<&str> = line_model
        .definition
        .members
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(names, vec!["Id", "Sku", "Quantity", "Order", "Discount"]);
    assert_eq!(property_type(&line_model.definition, "Discount"), "decimal");

    let writes = host.writes().await;
    let outcome = codesync::prelude::session(&host, full_closure())
        .synchronize("DbOrderEntity", ArtifactKind::Model)
        .await
        .unwrap();
    assert!(outcome.is_unchanged());
    assert_eq!(host.writes().await, writes);
}

#[tokio::test]
async fn test_repository_flattens_interfaces() {
    let Fixture { host, .. } = fixture().await;
    let contracts = Location::folder(SOURCE, "Contracts");
    host.add_type(
        contracts.clone(),
        TypeDefinition::interface(SOURCE, "IComponent")
            .with_member(Member::method("Attach", ty("void"), Vec::new())),
    )
    .await;
    host.add_type(
        contracts.clone(),
        TypeDefinition::interface(SOURCE, "IOrderQueries").with_member(Member::method(
            "FindAsync",
            ty("Task<DbOrderEntity>"),
            vec![Parameter::new("id", ty("Guid"))],
        )),
    )
    .await;
    host.add_type(
        contracts,
        TypeDefinition::interface(SOURCE, "IOrderRepository")
            .with_interface(TypeRef::qualified(SOURCE, "IComponent"))
            .with_interface(TypeRef::qualified(SOURCE, "IOrderQueries"))
            .with_member(Member::method(
                "SaveAsync",
                ty("Task"),
                vec![Parameter::new("order", ty("DbOrderEntity"))],
            )),
    )
    .await;

    let outcome = session(&host, settings())
        .synchronize("IOrderRepository", ArtifactKind::Repository)
        .await
        .unwrap();

    assert_eq!(outcome.artifact, "OrderRepository");
    assert_eq!(outcome.added, vec!["SaveAsync", "FindAsync"]);
    assert!(outcome.dependencies.is_empty());
    assert!(outcome.definition.find_member("Attach").is_none());
    assert_eq!(
        outcome.definition.inherited_interfaces,
        vec![TypeRef::qualified(SOURCE, "IOrderRepository")]
    );
    assert!(host.documents_named("OrderModel").await.is_empty());

    let text = host.text(&outcome.document).await.unwrap();
    assert!(text.contains("public class OrderRepository : IOrderRepository"));
    assert!(text.contains("public Task<DbOrderEntity> FindAsync(Guid id)"));
    assert!(text.contains("throw new NotImplementedException();"));

    let writes = host.writes().await;
    let again = session(&host, settings())
        .synchronize("IOrderRepository", ArtifactKind::Repository)
        .await
        .unwrap();
    assert!(again.is_unchanged());
    assert_eq!(host.writes().await, writes);
}

#[tokio::test]
async fn test_client_ensures_async_suffix() {
    let Fixture { host, .. } = fixture().await;
    let logic = host.documents_named("IOrderLogic").await.remove(0);
    let mut definition = host.definition(&logic).await.unwrap();
    definition
        .members
        .push(Member::method("Refresh", ty("Task"), Vec::new()));
    host.update_type(&logic, definition).await;

    let outcome = session(&host, settings())
        .synchronize("IOrderLogic", ArtifactKind::Client)
        .await
        .unwrap();

    assert_eq!(outcome.artifact, "OrderClient");
    assert_eq!(outcome.added, vec!["GetOrderAsync", "CancelAsync", "RefreshAsync"]);
    assert_eq!(outcome.dependencies, vec!["OrderModel"]);
    assert!(outcome.definition.inherited_interfaces.is_empty());

    let text = host.text(&outcome.document).await.unwrap();
    assert!(text.contains("private readonly IOrderLogic _channel;"));
    assert!(text.contains("public OrderClient(IOrderLogic channel)"));
    assert!(text.contains("public async Task<OrderModel> GetOrderAsync(Guid id)"));
    assert!(text.contains("return await _channel.GetOrderAsync(id);"));
    assert!(text.contains("public async Task RefreshAsync()"));
    assert!(text.contains("await _channel.Refresh();"));

    let writes = host.writes().await;
    let again = session(&host, settings())
        .synchronize("IOrderLogic", ArtifactKind::Client)
        .await
        .unwrap();
    assert!(again.is_unchanged());
    assert_eq!(host.writes().await, writes);
}

#[tokio::test]
async fn test_failed_append_names_artifact_and_member() {
    let Fixture { host, .. } = fixture().await;
    session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap();
    host.fail_operation("append_member").await;

    let error = session(&host, settings())
        .synchronize("DbCustomerEntity", ArtifactKind::Model)
        .await
        .unwrap_err();
    match &error {
        CodesyncError::Host {
            operation,
            artifact,
            member,
            ..
        } => {
            assert_eq!(*operation, "append_member");
            assert_eq!(artifact, "CustomerModel");
            assert_eq!(member.as_deref(), Some("Id"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(error.to_string().contains("injected failure in append_member"));

    // Nothing written before the failure is rolled back.
    let line_model = &host.documents_named("LineModel").await[0];
    assert_eq!(host.definition(line_model).await.unwrap().members.len(), 4);
    let customer_model = &host.documents_named("CustomerModel").await[0];
    assert!(host.definition(customer_model).await.unwrap().members.is_empty());
}

#[tokio::test]
async fn test_failed_import_is_reported_by_builder() {
    let Fixture { host, .. } = fixture().await;
    host.fail_operation("add_import").await;

    let error = session(&host, settings())
        .synchronize("DbLineEntity", ArtifactKind::Model)
        .await
        .unwrap_err();
    match &error {
        CodesyncError::Builder {
            artifact,
            member,
            source,
        } => {
            assert_eq!(artifact, "LineModel");
            assert_eq!(member, "Id");
            assert!(matches!(
                source.as_ref(),
                CodesyncError::Host {
                    operation: "add_import",
                    ..
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(host.documents_named("LineModel").await.len(), 1);
}
