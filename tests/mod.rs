
// This file organizes the integration tests into a cohesive test suite.
// Each module tests a specific aspect of the application:
// - smoke_tests: The web routes driven end to end with a mock recognizer
// - gemini_mock: The Gemini client against a local stand-in server
