//! Query assembly
//!
//! `ApiQuery::build` runs one raw parameter set through the whole pipeline:
//! directives are consumed first, then every other key is classified,
//! parsed and compiled into a predicate. The result is an immutable
//! `QueryPlan`; any failure aborts the build.

use crate::core::config::QueryConfig;
use crate::data::{EntitySchema, ReferenceResolver, SchemaProvider};

use super::error::{QueryError, QueryResult};
use super::fields::FieldResolver;
use super::names::NameGenerator;
use super::order::OrderBy;
use super::parser::{LogicalOp, parse_expression};
use super::plan::QueryPlan;
use super::predicate::PredicateCompiler;
use super::select::{SelectPlan, parse_select};
use super::values::{ParamTable, ValueResolver};

/// Raw request parameters in arrival order
///
/// Values are trimmed. Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    params: Vec<(String, String)>,
}

impl RawQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl AsRef<str>) {
        let key = key.into();
        let value = value.as_ref().trim().to_string();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for RawQuery {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Self::new();
        for (key, value) in iter {
            query.insert(key, value);
        }
        query
    }
}

/// Identity column every find row carries when rows get attached data
const ID_PROPERTY: &str = "id";

/// Directive keys, matched case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Select,
    Order,
    Offset,
    Page,
    Limit,
    Keyword,
    Permissions,
    Seals,
    Verified,
    Or,
    Files,
}

impl Directive {
    fn parse(key: &str) -> Option<Self> {
        let directive = match key.to_ascii_lowercase().as_str() {
            "@select" => Self::Select,
            "@order" => Self::Order,
            "@offset" => Self::Offset,
            "@page" => Self::Page,
            "@limit" => Self::Limit,
            "@keyword" => Self::Keyword,
            "@permissions" => Self::Permissions,
            "@seals" => Self::Seals,
            "@verified" => Self::Verified,
            "@or" => Self::Or,
            "@files" => Self::Files,
            _ => return None,
        };
        Some(directive)
    }
}

pub struct ApiQuery;

impl ApiQuery {
    /// Compile `raw` against the schema of `kind`
    pub fn build(
        kind: &str,
        raw: &RawQuery,
        schemas: &dyn SchemaProvider,
        references: &dyn ReferenceResolver,
        config: &QueryConfig,
    ) -> QueryResult<QueryPlan> {
        let schema = schemas
            .schema(kind)
            .ok_or_else(|| QueryError::unknown_entity(kind))?;

        tracing::debug!(kind, params = raw.len(), "Building query plan");

        let builder = PlanBuilder {
            schema: &schema,
            values: ValueResolver::new(references),
            config,
        };
        let plan = builder.build(raw)?;

        tracing::debug!(
            kind,
            joins = plan.joins().len(),
            predicates = plan.predicates().len(),
            params = plan.params().len(),
            "Built query plan"
        );
        Ok(plan)
    }
}

struct PlanBuilder<'a> {
    schema: &'a EntitySchema,
    values: ValueResolver<'a>,
    config: &'a QueryConfig,
}

impl PlanBuilder<'_> {
    fn build(&self, raw: &RawQuery) -> QueryResult<QueryPlan> {
        let schema = self.schema;
        let mut names = NameGenerator::new();
        let mut params = ParamTable::new();

        let mut select: Option<SelectPlan> = None;
        let mut order: Option<Vec<OrderBy>> = None;
        let mut offset = None;
        let mut page = None;
        let mut limit = None;
        let mut keyword = None;
        let mut permissions = Vec::new();
        let mut seals = Vec::new();
        let mut combinator = LogicalOp::And;
        let mut filters = Vec::new();

        for (key, value) in raw.iter() {
            let Some(directive) = Directive::parse(key) else {
                filters.push((key, value));
                continue;
            };
            match directive {
                Directive::Select => select = Some(parse_select(value, schema, &mut names)?),
                Directive::Order => order = Some(OrderBy::parse_list(key, value, schema)?),
                Directive::Offset => offset = Some(parse_integer(key, value)?),
                Directive::Page => page = Some(parse_integer(key, value)?),
                Directive::Limit => {
                    let n = parse_integer(key, value)?;
                    if let Some(max) = self.config.max_limit
                        && n > max
                    {
                        return Err(QueryError::invalid_argument(
                            key,
                            format!("limit must not exceed {}", max),
                        ));
                    }
                    limit = Some(n);
                }
                Directive::Keyword => keyword = Some(value.to_string()),
                Directive::Permissions => permissions = split_list(value),
                Directive::Seals => {
                    seals = split_list(value)
                        .iter()
                        .map(|s| parse_integer(key, s))
                        .collect::<QueryResult<Vec<_>>>()?;
                }
                Directive::Verified => seals = self.config.verified_seal_ids.clone(),
                Directive::Or => combinator = LogicalOp::Or,
                Directive::Files => {
                    tracing::warn!(key, "File selection is not supported, ignoring");
                }
            }
        }

        let fields = FieldResolver::new(schema);
        let mut joins = Vec::new();
        let mut predicates = Vec::new();

        for (key, value) in filters {
            let target = fields.resolve(key, &mut names)?;
            // ignored keys have no column and never count against the limit
            let Some(column) = target.column().cloned() else {
                continue;
            };
            if predicates.len() == self.config.max_filters {
                return Err(QueryError::invalid_argument(
                    key,
                    format!("too many filters (max {})", self.config.max_filters),
                ));
            }
            let node = parse_expression(key, value)?;
            let predicate =
                PredicateCompiler::new(&self.values, &mut params).compile(&column, &node);

            let target_joins = target.into_joins();
            for join in &target_joins {
                tracing::trace!(key, alias = %join.alias, "Allocated join");
            }
            joins.extend(target_joins);
            predicates.push(predicate);
        }

        let select = select.unwrap_or_else(|| SelectPlan {
            properties: vec![ID_PROPERTY.to_string()],
            ..SelectPlan::default()
        });
        let mut select_properties = select.properties;
        for implicit in &self.config.implicit_select {
            if schema.has_property(implicit) && !select_properties.contains(implicit) {
                select_properties.push(implicit.clone());
            }
        }
        // sub-select and metadata rows are attached by id
        let needs_id = select_properties.is_empty()
            || !select.metadata.is_empty()
            || !select.sub_selects.is_empty();
        if needs_id && !select_properties.iter().any(|p| p == ID_PROPERTY) {
            select_properties.insert(0, ID_PROPERTY.to_string());
        }

        let order = match order {
            Some(order) => order,
            None => self.default_order(),
        };

        Ok(QueryPlan {
            entity_class: schema.class_name.clone(),
            metadata_class: schema.metadata_class_name.clone(),
            select_properties,
            select_metadata: select.metadata,
            sub_selects: select.sub_selects,
            joins,
            predicates,
            combinator,
            order,
            offset,
            page,
            limit,
            keyword,
            permissions,
            seals,
            params,
            subquery_root: names.subquery_root(),
        })
    }

    /// Configured default order; unusable defaults leave the plan unordered
    fn default_order(&self) -> Vec<OrderBy> {
        match OrderBy::parse_list("@order", &self.config.default_order, self.schema) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(
                    kind = %self.schema.kind,
                    error = %e,
                    "Default order does not apply, leaving plan unordered"
                );
                Vec::new()
            }
        }
    }
}

fn parse_integer(key: &str, value: &str) -> QueryResult<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        QueryError::invalid_argument(key, format!("expected a non-negative integer, got '{}'", value))
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Anonymous, EntityRef};
    use crate::query::testing::{logged_in, registry};
    use crate::query::values::ParamValue;

    fn build_with(
        pairs: &[(&str, &str)],
        references: &dyn ReferenceResolver,
        config: &QueryConfig,
    ) -> QueryResult<QueryPlan> {
        let raw: RawQuery = pairs.iter().copied().collect();
        ApiQuery::build("agent", &raw, &registry(), references, config)
    }

    fn build(pairs: &[(&str, &str)]) -> QueryResult<QueryPlan> {
        build_with(pairs, &Anonymous, &QueryConfig::default())
    }

    #[test]
    fn minimal_plan() {
        let plan = build(&[("id", "GT(10)")]).unwrap();
        assert_eq!(
            plan.find_dql(),
            "SELECT\n\te.id, e.publicLocation\nFROM MapasCulturais\\Entities\\Agent e\nWHERE\n\te.id > :v0\nORDER BY e.id ASC"
        );
        assert_eq!(
            plan.params().get("v0"),
            Some(&ParamValue::Scalar("10".to_string()))
        );
    }

    #[test]
    fn select_limits_properties() {
        let plan = build(&[("@select", "id,name")]).unwrap();
        assert_eq!(plan.select_properties(), ["id", "name", "publicLocation"]);
        assert!(plan.select_metadata().is_empty());
        assert!(plan.sub_selects().is_empty());

        let config = QueryConfig {
            implicit_select: Vec::new(),
            ..QueryConfig::default()
        };
        let plan = build_with(&[("@select", "id,name")], &Anonymous, &config).unwrap();
        assert_eq!(plan.select_properties(), ["id", "name"]);
    }

    #[test]
    fn select_brace_expansion() {
        let plan = build(&[("@select", "owner.{id,name}")]).unwrap();
        let subs = plan.sub_selects();
        assert_eq!(subs.len(), 2);
        assert_eq!((subs[0].path.as_str(), subs[0].member.as_str()), ("owner", "id"));
        assert_eq!((subs[1].path.as_str(), subs[1].member.as_str()), ("owner", "name"));
        assert!(plan.sub_select_dql(&subs[1].token).is_some());
    }

    #[test]
    fn directive_names_are_case_insensitive() {
        let plan = build(&[("@SELECT", "name"), ("@Limit", "5")]).unwrap();
        assert_eq!(plan.select_properties()[0], "name");
        assert_eq!(plan.limit(), Some(5));
    }

    #[test]
    fn pagination_offset() {
        let plan = build(&[("@limit", "10"), ("@page", "3")]).unwrap();
        assert_eq!(plan.offset(), 20);

        let plan = build(&[("@limit", "10"), ("@page", "3"), ("@offset", "0")]).unwrap();
        assert_eq!(plan.offset(), 0);
    }

    #[test]
    fn non_integer_pagination_fails() {
        for key in ["@limit", "@page", "@offset", "@seals"] {
            assert!(
                matches!(build(&[(key, "ten")]), Err(QueryError::InvalidArgument { .. })),
                "{key} should fail"
            );
        }
    }

    #[test]
    fn max_limit_is_enforced() {
        let config = QueryConfig {
            max_limit: Some(100),
            ..QueryConfig::default()
        };
        assert!(build_with(&[("@limit", "100")], &Anonymous, &config).is_ok());
        assert!(matches!(
            build_with(&[("@limit", "101")], &Anonymous, &config),
            Err(QueryError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn max_filters_is_enforced() {
        let config = QueryConfig {
            max_filters: 1,
            ..QueryConfig::default()
        };
        let pairs = [("id", "GT(1)"), ("name", "EQ(x)")];
        let err = build_with(&pairs, &Anonymous, &config).unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { ref key, .. } if key == "name"));
    }

    #[test]
    fn ignored_keys_do_not_count_against_max_filters() {
        let config = QueryConfig {
            max_filters: 1,
            ..QueryConfig::default()
        };
        let plan = build_with(
            &[("_", "123"), ("callback", "jsonp"), ("id", "EQ(1)")],
            &Anonymous,
            &config,
        )
        .unwrap();
        assert_eq!(plan.predicates().len(), 1);
    }

    #[test]
    fn deeply_nested_filter_fails_without_crashing() {
        let value = format!("{}EQ(1){}", "OR(".repeat(3000), ")".repeat(3000));
        let err = build(&[("id", value.as_str())]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { ref key, .. } if key == "id"));
    }

    #[test]
    fn escaped_comma_inside_nested_in() {
        let plan = build(&[("name", r"OR(IN(a\,b,c),EQ(d))")]).unwrap();
        assert_eq!(
            plan.predicates()[0].render("e"),
            "(e.name IN (:v0, :v1) OR e.name = :v2)"
        );
        assert_eq!(
            plan.params().get("v0"),
            Some(&ParamValue::Scalar("a,b".to_string()))
        );
        assert_eq!(
            plan.params().get("v1"),
            Some(&ParamValue::Scalar("c".to_string()))
        );
    }

    #[test]
    fn sub_selects_always_carry_id() {
        let config = QueryConfig {
            implicit_select: Vec::new(),
            ..QueryConfig::default()
        };
        let plan = build_with(&[("@select", "owner.name")], &Anonymous, &config).unwrap();
        assert_eq!(plan.select_properties(), ["id"]);
        assert!(plan.find_dql().starts_with("SELECT\n\te.id\nFROM "));

        let plan = build(&[("@select", "name,owner.name")]).unwrap();
        assert_eq!(plan.select_properties(), ["id", "name", "publicLocation"]);

        let plan = build(&[("@select", "site")]).unwrap();
        assert_eq!(plan.select_properties(), ["id", "publicLocation"]);
    }

    #[test]
    fn select_never_renders_empty_column_list() {
        let config = QueryConfig {
            implicit_select: Vec::new(),
            ..QueryConfig::default()
        };
        let plan = build_with(&[("@select", "bogus")], &Anonymous, &config).unwrap();
        assert_eq!(plan.select_properties(), ["id"]);
    }

    #[test]
    fn plain_select_without_attachments_keeps_its_columns() {
        let plan = build(&[("@select", "name")]).unwrap();
        assert_eq!(plan.select_properties(), ["name", "publicLocation"]);
    }

    #[test]
    fn or_directive_switches_combinator() {
        let pairs = [("id", "EQ(1)"), ("name", "EQ(fulano)")];
        let and = build(&pairs).unwrap();
        assert!(and.find_dql().contains("e.id = :v0 AND\n\te.name = :v1"));

        let mut or_pairs = pairs.to_vec();
        or_pairs.push(("@or", "1"));
        let or = build(&or_pairs).unwrap();
        assert_eq!(or.combinator(), LogicalOp::Or);
        assert!(or.find_dql().contains("e.id = :v0 OR\n\te.name = :v1"));
    }

    #[test]
    fn unknown_key_fails_the_build() {
        assert_eq!(
            build(&[("id", "GT(1)"), ("bogus", "EQ(1)")]).unwrap_err(),
            QueryError::unknown_field("bogus")
        );
    }

    #[test]
    fn ignored_keys_contribute_nothing() {
        let plan = build(&[("_", "123"), ("callback", "jsonp"), ("id", "EQ(1)")]).unwrap();
        assert_eq!(plan.predicates().len(), 1);
        assert_eq!(plan.params().len(), 1);
    }

    #[test]
    fn ignored_keys_skip_expression_parsing() {
        assert!(build(&[("_ts", "not an expression")]).is_ok());
    }

    #[test]
    fn invalid_expression_names_key() {
        let err = build(&[("name", "FOO(1)")]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidExpression { ref key, .. } if key == "name"));
    }

    #[test]
    fn anonymous_owner_filter_binds_null() {
        let plan = build(&[("owner", "EQ(@me)")]).unwrap();
        assert!(plan.find_dql().contains("e.owner = :v0"));
        assert_eq!(plan.params().get("v0"), Some(&ParamValue::Null));
    }

    #[test]
    fn logged_in_references_resolve() {
        let refs = logged_in();
        let plan = build_with(
            &[("user", "EQ(@me)"), ("owner", "IN(@profile,@agent:10,@agent:99)")],
            &refs,
            &QueryConfig::default(),
        )
        .unwrap();

        let dql = plan.find_dql();
        assert!(dql.contains("LEFT JOIN e.owner __user_agent__"));
        assert!(dql.contains("__user_agent__.user = :v0"));
        assert!(dql.contains("e.owner IN (:v1, :v2, :v3)"));

        let params = plan.params();
        assert_eq!(params.get("v0"), Some(&ParamValue::Entity(EntityRef::new("user", 7))));
        assert_eq!(params.get("v1"), Some(&ParamValue::Entity(EntityRef::new("agent", 3))));
        assert_eq!(params.get("v2"), Some(&ParamValue::Entity(EntityRef::new("agent", 10))));
        assert_eq!(params.get("v3"), Some(&ParamValue::Null));
    }

    #[test]
    fn metadata_and_taxonomy_filters_join() {
        let plan = build(&[("site", "LIKE(*example*)"), ("term:area", "IN(Music,Dance)")]).unwrap();
        let dql = plan.count_dql();
        assert_eq!(
            dql,
            "SELECT\n\tCOUNT(e.id)\nFROM MapasCulturais\\Entities\\Agent e\n\tLEFT JOIN e.__metadata m0 WITH m0.key = 'site'\n\tLEFT JOIN e.__termRelations tr1\n\tLEFT JOIN tr1.term t1 WITH t1.taxonomy = 2\nWHERE\n\tunaccent(m0.value) LIKE unaccent(:v0) AND\n\tt1.term IN (:v1, :v2)"
        );
    }

    #[test]
    fn every_rendered_param_is_bound() {
        let plan = build(&[
            ("id", "OR(GT(1),BET(5,9))"),
            ("location", "GEONEAR(-46.6,-23.5,1000)"),
            ("name", "!NULL()"),
        ])
        .unwrap();
        for predicate in plan.predicates() {
            for name in predicate.param_names() {
                assert!(plan.params().contains(name), "{name} is not bound");
            }
        }
        assert_eq!(plan.params().len(), 6);
    }

    #[test]
    fn subquery_uses_fresh_root() {
        let plan = build(&[("user", "EQ(1)"), ("site", "EQ(x)")]).unwrap();
        let sub = plan.subquery_dql("id").unwrap();
        assert!(sub.starts_with("SELECT\n\te_1.id\nFROM MapasCulturais\\Entities\\Agent e_1"));
        assert!(sub.contains("LEFT JOIN e_1.owner __user_agent__"));
        assert!(sub.contains("LEFT JOIN e_1.__metadata m0"));
        assert!(!sub.contains(" e."));
    }

    #[test]
    fn build_is_deterministic() {
        let pairs = [("site", "EQ(a)"), ("term:tag", "EQ(b)"), ("@select", "owner.name")];
        assert_eq!(build(&pairs).unwrap().find_dql(), build(&pairs).unwrap().find_dql());
    }

    #[test]
    fn explicit_order_overrides_default() {
        let plan = build(&[("@order", "name DESC")]).unwrap();
        assert!(plan.find_dql().ends_with("ORDER BY e.name DESC"));
    }

    #[test]
    fn unusable_default_order_is_dropped() {
        let config = QueryConfig {
            default_order: "bogus ASC".to_string(),
            ..QueryConfig::default()
        };
        let plan = build_with(&[], &Anonymous, &config).unwrap();
        assert!(plan.order().is_empty());
    }

    #[test]
    fn directive_values_are_kept() {
        let config = QueryConfig {
            verified_seal_ids: vec![1, 2],
            ..QueryConfig::default()
        };
        let plan = build_with(
            &[
                ("@keyword", "teatro"),
                ("@permissions", "view, @control"),
                ("@seals", "4,5"),
                ("@files", ".avatar"),
            ],
            &Anonymous,
            &config,
        )
        .unwrap();
        assert_eq!(plan.keyword(), Some("teatro"));
        assert_eq!(plan.permissions(), ["view", "@control"]);
        assert_eq!(plan.seals(), [4, 5]);

        let plan = build_with(&[("@verified", "1")], &Anonymous, &config).unwrap();
        assert_eq!(plan.seals(), [1, 2]);
    }

    #[test]
    fn unknown_kind_fails() {
        let raw = RawQuery::new();
        let err =
            ApiQuery::build("space", &raw, &registry(), &Anonymous, &QueryConfig::default())
                .unwrap_err();
        assert_eq!(err, QueryError::unknown_entity("space"));
    }

    #[test]
    fn raw_query_replaces_and_trims() {
        let mut raw = RawQuery::new();
        raw.insert("id", " GT(1) ");
        raw.insert("name", "EQ(a)");
        raw.insert("id", "LT(5)");
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.get("id"), Some("LT(5)"));
        assert_eq!(raw.iter().next(), Some(("id", "LT(5)")));
    }
}
