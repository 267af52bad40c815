//! Cypher text for the structural queries.
//!
//! Classes are matched by qualified name first, then by simple name, which
//! mirrors the in-memory lookup.

/// Method ids for a class/method name pair (all overloads).
pub const RESOLVE_METHODS: &str = "
MATCH (c:Class) WHERE c.name = $class OR c.simpleName = $class
WITH c ORDER BY CASE WHEN c.name = $class THEN 0 ELSE 1 END, c.id
LIMIT 1
MATCH (m:Method {classId: c.id, name: $method})
RETURN m.id AS id
ORDER BY id";

/// Call edges into any of `$ids`.
pub const INCOMING_CALLS: &str = "
MATCH (a:Method)-[r:CALLS]->(b:Method)
WHERE b.id IN $ids
RETURN a.id AS fromId, b.id AS toId";

/// Call edges out of any of `$ids`.
pub const OUTGOING_CALLS: &str = "
MATCH (a:Method)-[r:CALLS]->(b:Method)
WHERE a.id IN $ids
RETURN a.id AS fromId, b.id AS toId";

/// Class name and layer of each method in `$ids`.
pub const DESCRIBE_METHODS: &str = "
MATCH (m:Method) WHERE m.id IN $ids
MATCH (c:Class {id: m.classId})
RETURN m.id AS id, m.name AS method, c.id AS classId, c.name AS className, c.layer AS layer";

pub const CLASS_INFO: &str = "
MATCH (c:Class) WHERE c.name = $class OR c.simpleName = $class
WITH c ORDER BY CASE WHEN c.name = $class THEN 0 ELSE 1 END, c.id
LIMIT 1
RETURN c.id AS id, c.name AS name, c.layer AS layer, c.interfaces AS interfaces,
       c.isAbstract AS isAbstract, c.isInterface AS isInterface";

/// Super-class names along the longest EXTENDS chain, nearest first. The last
/// entry may name a class that is not in the graph.
pub const ANCESTORS: &str = "
MATCH (c:Class {id: $id})
MATCH path = (c)-[:EXTENDS*0..16]->(:Class)
WITH path ORDER BY length(path) DESC
LIMIT 1
RETURN [n IN nodes(path) WHERE n.superClass IS NOT NULL | n.superClass] AS parents";

pub const DEPENDENCIES: &str = "
MATCH (m:Method {classId: $id})-[:CALLS]->(t:Method)
WHERE t.classId <> $id
MATCH (d:Class {id: t.classId})
RETURN collect(DISTINCT d.name) AS dependencies";

/// Shortest route from any of `$sources` to any of `$targets`, following
/// calls and interface dispatch.
pub const SHORTEST_CHAIN: &str = "
MATCH (s:Method) WHERE s.id IN $sources
MATCH (t:Method) WHERE t.id IN $targets AND t <> s
MATCH path = shortestPath((s)-[:CALLS|IMPLEMENTED_BY*..10]->(t))
WITH path ORDER BY length(path) ASC
LIMIT 1
RETURN [n IN nodes(path) | n.id] AS ids,
       [r IN relationships(path) | type(r)] AS relTypes,
       [r IN relationships(path) | coalesce(r.callType, 'DIRECT')] AS callTypes";
