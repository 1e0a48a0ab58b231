//! Starter file set for newly created projects.

use crate::error::CoreError;
use crate::project::Project;
use crate::tree::FileNode;

const APP_JS: &str = r#"import React from 'react';
import './App.css';

function App() {
  return (
    <div className="App">
      <header className="App-header">
        <h1>Welcome to Atelier!</h1>
        <p>Start editing your React components here.</p>
      </header>
    </div>
  );
}

export default App;
"#;

const APP_CSS: &str = r#".App {
  text-align: center;
}

.App-header {
  background-color: #282c34;
  padding: 20px;
  color: white;
  min-height: 100vh;
  display: flex;
  flex-direction: column;
  align-items: center;
  justify-content: center;
  font-size: calc(10px + 2vmin);
}
"#;

const INDEX_JS: &str = r#"import React from 'react';
import ReactDOM from 'react-dom/client';
import App from './App';

const root = ReactDOM.createRoot(document.getElementById('root'));
root.render(
  <React.StrictMode>
    <App />
  </React.StrictMode>
);
"#;

/// The fixed starter node set: three root-level files.
pub fn starter_files() -> Vec<FileNode> {
    vec![
        FileNode::file("App.js", APP_JS, None).expect("starter file names are valid"),
        FileNode::file("App.css", APP_CSS, None).expect("starter file names are valid"),
        FileNode::file("index.js", INDEX_JS, None).expect("starter file names are valid"),
    ]
}

/// Create a project pre-populated with the starter template.
pub fn project_from_template(name: &str) -> Result<Project, CoreError> {
    let mut project = Project::new(name)?;
    project.files = starter_files();
    Ok(project)
}
