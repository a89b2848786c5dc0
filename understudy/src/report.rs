use crate::Mock;

impl Mock {
    /// Export the substitute's setups and call log as JSON.
    ///
    /// Useful for inspecting a failing test or attaching the call history
    /// to a bug report.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let json = repo.to_json()?;
    /// println!("{json}");
    /// ```
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    pub fn to_json(&self) -> serde_json::Result<String> {
        use serde::Serialize;

        use crate::{MockConfig, MockId, SetupId, Times, VerificationState};

        #[derive(Serialize)]
        struct SetupExport {
            id: SetupId,
            setup: String,
            conditional: bool,
            expected: Option<Times>,
            executions: usize,
        }

        #[derive(Serialize)]
        struct InvocationExport {
            seq: u64,
            method: String,
            arguments: Vec<String>,
            state: VerificationState,
            matched_setup: Option<SetupId>,
        }

        #[derive(Serialize)]
        struct MockExport<'a> {
            id: MockId,
            name: &'a str,
            contract: &'a str,
            config: MockConfig,
            setups: Vec<SetupExport>,
            invocations: Vec<InvocationExport>,
        }

        let setups = self
            .setups()
            .iter()
            .map(|s| SetupExport {
                id: s.id(),
                setup: s.to_string(),
                conditional: s.is_conditional(),
                expected: s.expected_times(),
                executions: s.execution_count(),
            })
            .collect();

        let invocations = self
            .invocations()
            .iter()
            .map(|i| InvocationExport {
                seq: i.seq(),
                method: i.method().to_string(),
                arguments: i.arguments().iter().map(ToString::to_string).collect(),
                state: i.state(),
                matched_setup: i.matched_setup(),
            })
            .collect();

        serde_json::to_string_pretty(&MockExport {
            id: self.id(),
            name: self.name(),
            contract: self.contract().name(),
            config: *self.config(),
            setups,
            invocations,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value as Json;

    use crate::{Arg, Call, Contract, Mock, Param, Times, TypeRef, Value};

    #[test]
    fn exports_setups_and_invocations() {
        let c = Contract::interface("IRepository")
            .method("get", [Param::new("key", TypeRef::Str)], TypeRef::Int)
            .build();
        let get = c.method("get").unwrap();
        let mock = Mock::builder(&c).name("repo").build().unwrap();
        mock.setup(Call::new(get, [Arg::from("a")]))
            .unwrap()
            .returns(1)
            .unwrap()
            .verifiable_with(Times::once());
        mock.call(get, vec![Value::from("a")]).unwrap();
        mock.verify().unwrap();

        let json = mock.to_json().unwrap();
        let parsed: Json = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["name"], "repo");
        assert_eq!(parsed["contract"], "IRepository");
        assert_eq!(parsed["config"]["behavior"], "Loose");
        let setups = parsed["setups"].as_array().unwrap();
        assert_eq!(setups.len(), 1);
        assert_eq!(setups[0]["executions"], 1);
        let invocations = parsed["invocations"].as_array().unwrap();
        assert_eq!(invocations[0]["arguments"][0], "\"a\"");
        assert_eq!(invocations[0]["state"], "Verified");
    }
}
