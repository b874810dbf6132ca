// src/web/pages.rs
//! Static HTML served by the router

pub const GITHUB_TARGET: &str = "https://www.github.com";
pub const WIKIPEDIA_TARGET: &str = "https://www.wikipedia.org";

/// Target picker. Also returned as the confirmation page after a render.
pub fn render_form() -> String {
    format!(
        r#"<html><body style="font-family: monospace">
<h3>select example to turn to pdf</h3>
<form action="process" method="post">
    <select id="new_data" name="new_data" class="tag-select chzn-done" multiple="">
        <option value="{GITHUB_TARGET}">github.com</option>
        <option value="{WIKIPEDIA_TARGET}">wikipedia.org</option>
    </select>
    <input type="Submit" value="Send" />
</form>
</body></html>
"#
    )
}

pub const GRAPHIQL: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>GraphiQL</title>
  <style>body { height: 100%; margin: 0; width: 100%; overflow: hidden; } #graphiql { height: 100vh; }</style>
  <link rel="stylesheet" href="https://unpkg.com/graphiql@3/graphiql.min.css" />
  <script crossorigin src="https://unpkg.com/react@18/umd/react.production.min.js"></script>
  <script crossorigin src="https://unpkg.com/react-dom@18/umd/react-dom.production.min.js"></script>
  <script crossorigin src="https://unpkg.com/graphiql@3/graphiql.min.js"></script>
</head>
<body>
  <div id="graphiql">Loading...</div>
  <script>
    const fetcher = GraphiQL.createFetcher({ url: '/graphql' });
    ReactDOM.createRoot(document.getElementById('graphiql')).render(
      React.createElement(GraphiQL, {
        fetcher,
        defaultQuery: '{\n  jobs {\n    id\n    position\n    company\n  }\n}\n',
      })
    );
  </script>
</body>
</html>
"#;
